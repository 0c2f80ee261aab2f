//! The set of selected groups.

use ps_core::{GroupId, GroupTree};
use smallvec::SmallVec;

/// Selected groups in selection order. Never holds duplicates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    ids: SmallVec<[GroupId; 4]>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids(&self) -> &[GroupId] {
        &self.ids
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn contains(&self, id: GroupId) -> bool {
        self.ids.contains(&id)
    }

    /// Replace the selection.
    pub fn set(&mut self, ids: impl IntoIterator<Item = GroupId>) {
        self.ids.clear();
        for id in ids {
            self.add(id);
        }
    }

    pub fn add(&mut self, id: GroupId) {
        if !self.ids.contains(&id) {
            self.ids.push(id);
        }
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Drop ids no longer in the tree, and the root.
    pub fn prune(&mut self, tree: &GroupTree) {
        let root = tree.root();
        self.ids.retain(|id| *id != root && tree.contains(*id));
    }

    /// Selected groups without a selected ancestor, in selection order.
    pub fn top_level(&self, tree: &GroupTree) -> Vec<GroupId> {
        top_level(tree, &self.ids)
    }
}

/// Members of `ids` that are in the tree, are not the root, and have no
/// ancestor in `ids`.
pub fn top_level(tree: &GroupTree, ids: &[GroupId]) -> Vec<GroupId> {
    let root = tree.root();
    let mut out: Vec<GroupId> = Vec::with_capacity(ids.len());
    for &id in ids {
        if id == root || !tree.contains(id) || out.contains(&id) {
            continue;
        }
        if ids.iter().any(|other| tree.is_ancestor_of(*other, id)) {
            continue;
        }
        out.push(id);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn nested_selection_keeps_outermost() {
        let mut tree = GroupTree::new();
        let root = tree.root();
        let outer = tree.create_child(root).unwrap();
        let inner = tree.create_child(outer).unwrap();
        let other = tree.create_child(root).unwrap();

        let mut selection = Selection::new();
        selection.set([inner, outer, other, outer]);
        assert_eq!(selection.len(), 3);
        assert_eq!(selection.top_level(&tree), vec![outer, other]);
    }

    #[test]
    fn prune_drops_removed_groups() {
        let mut tree = GroupTree::new();
        let root = tree.root();
        let a = tree.create_child(root).unwrap();
        let b = tree.create_child(root).unwrap();
        let mut selection = Selection::new();
        selection.set([a, b, root]);
        tree.remove(a).unwrap();
        selection.prune(&tree);
        assert_eq!(selection.ids(), &[b]);
    }
}
