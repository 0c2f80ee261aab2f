//! Error types for structural and binding operations on the group tree.
//!
//! Every fallible operation validates before it mutates, so an `Err` always
//! means the tree is exactly as it was before the call.

use crate::id::GroupId;

/// Why a structural edit was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HierarchyError {
    /// The new parent is the group itself or one of its descendants.
    #[error("reparenting would create a cycle")]
    CycleDetected,
    /// Leaf groups own strokes and cannot also own child groups.
    #[error("a leaf group cannot hold child groups")]
    LeafCannotHaveChildren,
    /// Composite groups own children and cannot also own strokes.
    #[error("a composite group cannot hold strokes")]
    CompositeCannotHaveStrokes,
    /// The root is fixed: it cannot be moved, removed, bound, or keyframed.
    #[error("the root group cannot be modified this way")]
    RootIsFixed,
    /// A group with the same id is already in the tree.
    #[error("group id is already in use")]
    DuplicateGroup,
    /// The operation needs geometry, but the group has no strokes or children.
    #[error("group is empty")]
    EmptyGroup,
}

/// Errors returned by `GroupTree` operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("invalid hierarchy: {0}")]
    InvalidHierarchy(#[from] HierarchyError),

    /// Stroke geometry collapsed below a usable collision polygon.
    #[error("group {group} has no usable physics shape ({vertices} vertices after simplification)")]
    UnsimplifiableShape { group: GroupId, vertices: usize },

    #[error("unknown group {0}")]
    UnknownGroup(GroupId),
}

pub type CoreResult<T> = Result<T, CoreError>;
