use lasso::{Spur, ThreadedRodeo};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Every group name seen by this process, shared by all trees.
static NAMES: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::default);

/// Suffix source for generated names.
static NEXT_SUFFIX: AtomicU64 = AtomicU64::new(0);

/// Name of the root group every `GroupTree` starts with.
pub const ROOT_NAME: &str = "root";

/// Names a drawing group.
///
/// Two ids are equal exactly when their names are. Names are never
/// forgotten, so an id held by an undo entry still prints and compares
/// correctly after its group has left the tree.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(Spur);

impl GroupId {
    /// The id named `name`, registering the name on first use.
    pub fn intern(name: &str) -> Self {
        GroupId(NAMES.get_or_intern(name))
    }

    pub fn as_str(&self) -> &str {
        NAMES.resolve(&self.0)
    }

    pub fn root() -> Self {
        Self::intern(ROOT_NAME)
    }

    pub fn is_root(&self) -> bool {
        *self == Self::root()
    }

    /// A name no other call has produced: `group_<n>`.
    pub fn generate() -> Self {
        Self::with_prefix("group")
    }

    /// Like `generate`, with a caller-chosen stem.
    pub fn with_prefix(prefix: &str) -> Self {
        let n = NEXT_SUFFIX.fetch_add(1, Ordering::Relaxed);
        Self::intern(&format!("{prefix}_{n}"))
    }
}

impl fmt::Debug for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.as_str())
    }
}

// Serialized as the bare name so snapshots stay readable.
impl Serialize for GroupId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for GroupId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(GroupId::intern(&name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_name_same_id() {
        let a = GroupId::intern("ball");
        let b = GroupId::intern("ball");
        assert_eq!(a, b);
        assert_ne!(a, GroupId::intern("paddle"));
        assert_eq!(a.as_str(), "ball");
        assert_eq!(format!("{a}"), "@ball");
        assert_eq!(format!("{a:?}"), "@ball");
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = GroupId::generate();
        let b = GroupId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("group_"));
        assert!(GroupId::with_prefix("stroke").as_str().starts_with("stroke_"));
        assert!(!a.is_root());
    }

    #[test]
    fn root_id_is_fixed() {
        assert_eq!(GroupId::root(), GroupId::intern("root"));
        assert!(GroupId::root().is_root());
    }
}
