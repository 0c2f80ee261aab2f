use ps_core::{CoreError, GroupId};

/// Why an intent was rejected. The scene is unchanged when one is returned.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EditorError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("nothing is selected")]
    NothingSelected,

    #[error("a manipulation is already in progress")]
    ManipulationInProgress,

    #[error("no manipulation is in progress")]
    NoActiveManipulation,

    #[error("no stroke is being drawn")]
    NoActiveStroke,

    /// Ungroup on a group without child groups.
    #[error("group {0} has no child groups to release")]
    NotAGroup(GroupId),
}

pub type EditorResult<T> = Result<T, EditorError>;
