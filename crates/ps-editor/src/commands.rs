//! Undo/Redo command stack.
//!
//! Every mutation is wrapped in a reversible `Command` that carries both
//! sides of the change, so undo and redo never consult anything outside
//! the entry itself. Commands are pushed to a stack; undo pops and reverts.

use crate::document::{Document, RemovedGroup};
use crate::error::{EditorError, EditorResult};
use crate::selection::top_level;
use kurbo::{Affine, Rect};
use ps_core::{
    CoreResult, DetachedGroup, DrawingGroup, GroupId, GroupKind, HierarchyError, KeyframeTrack,
    PhysicsBinding, Placement, Transform,
};
use serde::{Deserialize, Serialize};

/// Local transform of one group before and after an edit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformChange {
    pub id: GroupId,
    pub before: Transform,
    pub after: Transform,
}

/// One group moved into (or out of) a grouping node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberRecord {
    pub id: GroupId,
    /// Where the member lives when the group does not exist.
    pub outer: Placement,
    /// Its local transform inside the group.
    pub inner: Transform,
    /// Keyframes expressed outside and inside the group.
    pub outer_track: Option<KeyframeTrack>,
    pub inner_track: Option<KeyframeTrack>,
}

/// Everything needed to create or dissolve a grouping node exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupingRecord {
    /// The grouping node itself, without children.
    pub group: DrawingGroup,
    pub parent: GroupId,
    pub position: usize,
    pub members: Vec<MemberRecord>,
    pub group_track: Option<KeyframeTrack>,
}

/// A reversible edit of the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// A new subtree (usually a freshly drawn stroke).
    AddGroup(DetachedGroup),
    /// Deleted subtrees, in deletion order.
    RemoveGroups(Vec<RemovedGroup>),
    Group(GroupingRecord),
    Ungroup(GroupingRecord),
    Transform(Vec<TransformChange>),
    Visibility {
        id: GroupId,
        before: bool,
        after: bool,
    },
    Bind {
        id: GroupId,
        before: Option<PhysicsBinding>,
        after: Option<PhysicsBinding>,
    },
    Keyframe {
        group: GroupId,
        time: f64,
        before: Option<Transform>,
        after: Option<Transform>,
    },
    /// Applied in order, reverted in reverse order.
    Batch(Vec<Command>),
}

impl Command {
    pub fn apply(&self, doc: &mut Document) -> CoreResult<()> {
        match self {
            Command::AddGroup(detached) => doc.tree.restore(detached),
            Command::RemoveGroups(removed) => {
                for r in removed {
                    doc.remove_group(r.detached.subtree.id())?;
                }
                Ok(())
            }
            Command::Group(record) => form(doc, record),
            Command::Ungroup(record) => dissolve(doc, record),
            Command::Transform(changes) => {
                for c in changes {
                    doc.tree.set_transform(c.id, c.after)?;
                }
                Ok(())
            }
            Command::Visibility { id, after, .. } => doc.tree.set_visible(*id, *after).map(|_| ()),
            Command::Bind { id, after, .. } => doc.tree.set_binding(*id, after.clone()).map(|_| ()),
            Command::Keyframe {
                group, time, after, ..
            } => {
                set_keyframe(doc, *group, *time, *after);
                Ok(())
            }
            Command::Batch(commands) => {
                for c in commands {
                    c.apply(doc)?;
                }
                Ok(())
            }
        }
    }

    pub fn revert(&self, doc: &mut Document) -> CoreResult<()> {
        match self {
            Command::AddGroup(detached) => doc.tree.remove(detached.subtree.id()).map(|_| ()),
            Command::RemoveGroups(removed) => {
                for r in removed.iter().rev() {
                    doc.restore_group(r)?;
                }
                Ok(())
            }
            Command::Group(record) => dissolve(doc, record),
            Command::Ungroup(record) => form(doc, record),
            Command::Transform(changes) => {
                for c in changes {
                    doc.tree.set_transform(c.id, c.before)?;
                }
                Ok(())
            }
            Command::Visibility { id, before, .. } => doc.tree.set_visible(*id, *before).map(|_| ()),
            Command::Bind { id, before, .. } => doc.tree.set_binding(*id, before.clone()).map(|_| ()),
            Command::Keyframe {
                group, time, before, ..
            } => {
                set_keyframe(doc, *group, *time, *before);
                Ok(())
            }
            Command::Batch(commands) => {
                for c in commands.iter().rev() {
                    c.revert(doc)?;
                }
                Ok(())
            }
        }
    }
}

fn set_keyframe(doc: &mut Document, group: GroupId, time: f64, value: Option<Transform>) {
    match value {
        Some(t) => {
            doc.timeline.record_keyframe(group, time, t);
        }
        None => {
            doc.timeline.remove_keyframe(group, time);
        }
    }
}

fn form(doc: &mut Document, record: &GroupingRecord) -> CoreResult<()> {
    let members: Vec<(GroupId, Transform)> = record.members.iter().map(|m| (m.id, m.inner)).collect();
    doc.tree
        .form_group(record.group.clone(), record.parent, record.position, &members)?;
    for m in &record.members {
        doc.set_track(m.id, m.inner_track.clone());
    }
    doc.set_track(record.group.id, record.group_track.clone());
    Ok(())
}

fn dissolve(doc: &mut Document, record: &GroupingRecord) -> CoreResult<()> {
    let placements: Vec<Placement> = record.members.iter().map(|m| m.outer).collect();
    doc.tree.dissolve_group(record.group.id, &placements)?;
    doc.timeline.take_track(record.group.id);
    for m in &record.members {
        doc.set_track(m.id, m.outer_track.clone());
    }
    Ok(())
}

/// Re-express every keyframe of `track` through `map` (new parent space ←
/// old parent space), keeping each keyframe's pivot.
pub fn rebase_track(track: &KeyframeTrack, map: Affine) -> KeyframeTrack {
    let mut out = KeyframeTrack::new();
    for k in track.keyframes() {
        out.insert(k.time, Transform::from_affine(map * k.transform.to_affine(), k.transform.pivot));
    }
    out
}

/// Record for grouping `ids` (top-level subset) into a new group placed
/// where the first member sits. World transforms are unchanged.
pub fn grouping(doc: &Document, ids: &[GroupId]) -> EditorResult<GroupingRecord> {
    let tree = &doc.tree;
    let mut members = top_level(tree, ids);
    if members.is_empty() {
        return Err(EditorError::NothingSelected);
    }
    let order = tree.preorder();
    members.sort_by_key(|id| order.iter().position(|o| o == id));

    let first = members[0];
    let parent = tree
        .parent(first)
        .ok_or(EditorError::Core(HierarchyError::RootIsFixed.into()))?;
    let position = tree
        .children(parent)
        .iter()
        .take_while(|c| **c != first)
        .filter(|c| !members.contains(*c))
        .count();

    let parent_world = tree.world_transform(parent).unwrap_or(Affine::IDENTITY);
    let bounds = members
        .iter()
        .filter_map(|m| tree.world_bounds(*m))
        .reduce(|a: Rect, b| a.union(b));
    let pivot = bounds.map_or(kurbo::Point::ORIGIN, |b| parent_world.inverse() * b.center());

    let mut group = DrawingGroup::new(GroupId::generate());
    group.transform = Transform::with_pivot(pivot);
    let inside = (parent_world * group.transform.to_affine()).inverse();

    let mut records = Vec::with_capacity(members.len());
    for id in members {
        let (Some(outer_parent), Some(position), Some(node)) =
            (tree.parent(id), tree.position_in_parent(id), tree.get(id))
        else {
            return Err(ps_core::CoreError::UnknownGroup(id).into());
        };
        let map = inside * tree.parent_world_transform(id);
        let local = node.transform;
        let outer_track = doc.timeline.track(id).cloned();
        records.push(MemberRecord {
            id,
            outer: Placement {
                id,
                parent: outer_parent,
                position,
                transform: local,
            },
            inner: Transform::from_affine(map * local.to_affine(), local.pivot),
            inner_track: outer_track.as_ref().map(|t| rebase_track(t, map)),
            outer_track,
        });
    }

    Ok(GroupingRecord {
        group,
        parent,
        position,
        members: records,
        group_track: None,
    })
}

/// Record for releasing the children of `id` into its parent, in place.
pub fn ungrouping(doc: &Document, id: GroupId) -> EditorResult<GroupingRecord> {
    let tree = &doc.tree;
    if id == tree.root() {
        return Err(EditorError::Core(HierarchyError::RootIsFixed.into()));
    }
    if tree.kind(id) != Some(GroupKind::Composite) {
        return Err(EditorError::NotAGroup(id));
    }
    let (Some(parent), Some(position), Some(group)) = (tree.parent(id), tree.position_in_parent(id), tree.get(id))
    else {
        return Err(ps_core::CoreError::UnknownGroup(id).into());
    };

    let outside = group.transform.to_affine();
    let mut members = Vec::new();
    for (i, child) in tree.children(id).into_iter().enumerate() {
        let Some(node) = tree.get(child) else {
            continue;
        };
        let inner = node.transform;
        let inner_track = doc.timeline.track(child).cloned();
        members.push(MemberRecord {
            id: child,
            outer: Placement {
                id: child,
                parent,
                position: position + i,
                transform: Transform::from_affine(outside * inner.to_affine(), inner.pivot),
            },
            inner,
            outer_track: inner_track.as_ref().map(|t| rebase_track(t, outside)),
            inner_track,
        });
    }

    Ok(GroupingRecord {
        group: group.clone(),
        parent,
        position,
        members,
        group_track: doc.timeline.track(id).cloned(),
    })
}

/// A command plus the label shown for it in undo menus.
#[derive(Debug, Clone)]
struct HistoryEntry {
    command: Command,
    description: String,
}

/// Manages undo/redo stacks.
pub struct CommandStack {
    undo_stack: Vec<HistoryEntry>,
    redo_stack: Vec<HistoryEntry>,
    /// Maximum undo depth.
    max_depth: usize,
}

impl CommandStack {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: Vec::with_capacity(max_depth.min(256)),
            redo_stack: Vec::new(),
            max_depth: max_depth.max(1),
        }
    }

    /// Record an already-applied command.
    pub fn push(&mut self, command: Command, description: &str) {
        self.undo_stack.push(HistoryEntry {
            command,
            description: description.to_string(),
        });
        if self.undo_stack.len() > self.max_depth {
            self.undo_stack.remove(0);
        }

        // Clear redo stack on new action
        self.redo_stack.clear();
        log::debug!("history push: {description}");
    }

    /// Apply a command and push it. Nothing is recorded if it fails.
    pub fn execute(&mut self, doc: &mut Document, command: Command, description: &str) -> CoreResult<()> {
        command.apply(doc)?;
        self.push(command, description);
        Ok(())
    }

    /// Undo the last command. `None` when there is nothing to undo.
    pub fn undo(&mut self, doc: &mut Document) -> Option<String> {
        let entry = self.undo_stack.pop()?;
        if let Err(err) = entry.command.revert(doc) {
            log::warn!("undo '{}' failed: {err}", entry.description);
        }
        log::debug!("undo: {}", entry.description);
        let desc = entry.description.clone();
        self.redo_stack.push(entry);
        Some(desc)
    }

    /// Redo the last undone command. `None` when there is nothing to redo.
    pub fn redo(&mut self, doc: &mut Document) -> Option<String> {
        let entry = self.redo_stack.pop()?;
        if let Err(err) = entry.command.apply(doc) {
            log::warn!("redo '{}' failed: {err}", entry.description);
        }
        log::debug!("redo: {}", entry.description);
        let desc = entry.description.clone();
        self.undo_stack.push(entry);
        Some(desc)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }
}
