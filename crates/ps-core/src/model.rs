//! Core data model: strokes, drawing groups, and the group tree.
//!
//! The tree is an arena (`StableDiGraph`) of `DrawingGroup` values addressed
//! by `GroupId`. Edges go from parent → child; sibling order is kept
//! explicitly so undo can restore a group at its exact former position.
//!
//! A group is either a *leaf* (owns strokes), a *composite* (owns child
//! groups), or *empty* (neither yet). World transforms are always derived by
//! walking the ancestor chain; nothing is cached.

use crate::error::{CoreError, CoreResult, HierarchyError};
use crate::id::GroupId;
use crate::simplify::{SimplifyParams, convex_hull, is_degenerate_shape, simplify_to_range, trim_convex};
use crate::transform::Transform;
use kurbo::{Affine, Point, Rect};
use petgraph::Direction;
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableDiGraph;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ─── Colors ──────────────────────────────────────────────────────────────

/// RGBA color. Stored as 4 × f32 [0.0, 1.0].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Color = Color::rgba(0.0, 0.0, 0.0, 1.0);

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Parse `#RRGGBB` or `#RRGGBBAA` (the leading `#` is optional).
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| -> Option<f32> {
            let byte = u8::from_str_radix(hex.get(i..i + 2)?, 16).ok()?;
            Some(f32::from(byte) / 255.0)
        };
        match hex.len() {
            6 => Some(Self::rgba(channel(0)?, channel(2)?, channel(4)?, 1.0)),
            8 => Some(Self::rgba(channel(0)?, channel(2)?, channel(4)?, channel(6)?)),
            _ => None,
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

// ─── Strokes ─────────────────────────────────────────────────────────────

/// A committed freehand stroke, in its group's content coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub points: Vec<Point>,
    pub color: Color,
    pub width: f64,
}

impl Stroke {
    pub fn new(points: Vec<Point>, color: Color, width: f64) -> Self {
        Self {
            points,
            color,
            width,
        }
    }

    /// Axis-aligned bounds of the points, or `None` for an empty stroke.
    pub fn bounds(&self) -> Option<Rect> {
        bounds_of(self.points.iter().copied())
    }
}

fn bounds_of(mut points: impl Iterator<Item = Point>) -> Option<Rect> {
    let first = points.next()?;
    Some(points.fold(Rect::from_points(first, first), |r, p| r.union_pt(p)))
}

// ─── Physics binding ─────────────────────────────────────────────────────

/// How the simulator treats a bound group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BodyType {
    /// Never moves; other bodies collide with it.
    Static,
    /// Moved by gravity and contacts.
    #[default]
    Dynamic,
    /// Follows its authored keyframes and pushes dynamic bodies around.
    Kinematic,
}

/// Surface and mass parameters of a bound group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// Mass per unit area.
    pub density: f64,
    /// Coulomb friction coefficient.
    pub friction: f64,
    /// Bounciness in `[0, 1]`.
    pub restitution: f64,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            density: 1.0,
            friction: 0.4,
            restitution: 0.2,
        }
    }
}

/// Association of a group with a simulated rigid body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicsBinding {
    pub body_type: BodyType,
    pub material: Material,
    /// Convex collision polygon (counter-clockwise) in the group's content
    /// coordinates.
    pub shape: Vec<Point>,
}

// ─── Drawing groups ──────────────────────────────────────────────────────

/// What a group currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    Empty,
    Leaf,
    Composite,
}

/// A node in the group tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawingGroup {
    pub id: GroupId,
    /// Only non-empty for leaf groups.
    pub strokes: Vec<Stroke>,
    pub transform: Transform,
    pub visible: bool,
    pub physics: Option<PhysicsBinding>,
}

impl DrawingGroup {
    pub fn new(id: GroupId) -> Self {
        Self {
            id,
            strokes: Vec::new(),
            transform: Transform::IDENTITY,
            visible: true,
            physics: None,
        }
    }

    /// A leaf group holding one stroke, pivoting about the stroke's centre.
    pub fn from_stroke(id: GroupId, stroke: Stroke) -> Self {
        let pivot = stroke.bounds().map(|b| b.center()).unwrap_or(Point::ORIGIN);
        Self {
            transform: Transform::with_pivot(pivot),
            strokes: vec![stroke],
            ..Self::new(id)
        }
    }

    /// Bounds of the group's own strokes in content coordinates.
    pub fn content_bounds(&self) -> Option<Rect> {
        bounds_of(self.strokes.iter().flat_map(|s| s.points.iter().copied()))
    }
}

/// A group and all its descendants, detached from any tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSubtree {
    pub group: DrawingGroup,
    pub children: Vec<GroupSubtree>,
}

impl GroupSubtree {
    pub fn leaf(group: DrawingGroup) -> Self {
        Self {
            group,
            children: Vec::new(),
        }
    }

    pub fn id(&self) -> GroupId {
        self.group.id
    }

    /// Ids in pre-order, starting with this subtree's root.
    pub fn ids(&self) -> Vec<GroupId> {
        let mut out = vec![self.group.id];
        for child in &self.children {
            out.extend(child.ids());
        }
        out
    }
}

/// A removed subtree plus where it used to live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetachedGroup {
    pub parent: GroupId,
    pub position: usize,
    pub subtree: GroupSubtree,
}

/// Where a member group goes when a group is dissolved.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub id: GroupId,
    pub parent: GroupId,
    pub position: usize,
    pub transform: Transform,
}

// ─── Group tree ──────────────────────────────────────────────────────────

/// The hierarchy of drawing groups.
#[derive(Debug, Clone)]
pub struct GroupTree {
    graph: StableDiGraph<DrawingGroup, ()>,
    root: NodeIndex,
    id_index: HashMap<GroupId, NodeIndex>,
    /// Sibling order per parent. Every edge parent → child appears here.
    child_order: HashMap<NodeIndex, Vec<NodeIndex>>,
}

impl GroupTree {
    /// Create a tree holding only the root group.
    #[must_use]
    pub fn new() -> Self {
        let mut graph = StableDiGraph::new();
        let root_id = GroupId::root();
        let root = graph.add_node(DrawingGroup::new(root_id));

        let mut id_index = HashMap::new();
        id_index.insert(root_id, root);

        Self {
            graph,
            root,
            id_index,
            child_order: HashMap::new(),
        }
    }

    pub fn root(&self) -> GroupId {
        self.graph[self.root].id
    }

    /// Number of groups, including the root.
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    /// Whether the tree holds only the root.
    pub fn is_empty(&self) -> bool {
        self.len() == 1
    }

    pub fn contains(&self, id: GroupId) -> bool {
        self.id_index.contains_key(&id)
    }

    pub fn get(&self, id: GroupId) -> Option<&DrawingGroup> {
        self.id_index.get(&id).map(|idx| &self.graph[*idx])
    }

    fn index(&self, id: GroupId) -> CoreResult<NodeIndex> {
        self.id_index
            .get(&id)
            .copied()
            .ok_or(CoreError::UnknownGroup(id))
    }

    fn group_mut(&mut self, id: GroupId) -> CoreResult<&mut DrawingGroup> {
        let idx = self.index(id)?;
        Ok(&mut self.graph[idx])
    }

    pub fn kind(&self, id: GroupId) -> Option<GroupKind> {
        let idx = self.id_index.get(&id)?;
        Some(self.kind_at(*idx))
    }

    fn kind_at(&self, idx: NodeIndex) -> GroupKind {
        if idx == self.root || self.child_order.get(&idx).is_some_and(|c| !c.is_empty()) {
            GroupKind::Composite
        } else if !self.graph[idx].strokes.is_empty() {
            GroupKind::Leaf
        } else {
            GroupKind::Empty
        }
    }

    fn parent_index(&self, idx: NodeIndex) -> Option<NodeIndex> {
        self.graph.neighbors_directed(idx, Direction::Incoming).next()
    }

    pub fn parent(&self, id: GroupId) -> Option<GroupId> {
        let idx = self.id_index.get(&id)?;
        self.parent_index(*idx).map(|p| self.graph[p].id)
    }

    /// Children in sibling order (back to front).
    pub fn children(&self, id: GroupId) -> Vec<GroupId> {
        self.id_index
            .get(&id)
            .and_then(|idx| self.child_order.get(idx))
            .map(|order| order.iter().map(|c| self.graph[*c].id).collect())
            .unwrap_or_default()
    }

    pub fn position_in_parent(&self, id: GroupId) -> Option<usize> {
        let idx = *self.id_index.get(&id)?;
        let parent = self.parent_index(idx)?;
        self.child_order.get(&parent)?.iter().position(|c| *c == idx)
    }

    /// Check if `ancestor` is a parent/grandparent/etc. of `descendant`.
    pub fn is_ancestor_of(&self, ancestor: GroupId, descendant: GroupId) -> bool {
        let (Some(&target), Some(&start)) = (self.id_index.get(&ancestor), self.id_index.get(&descendant))
        else {
            return false;
        };
        let mut current = start;
        while let Some(parent) = self.parent_index(current) {
            if parent == target {
                return true;
            }
            current = parent;
        }
        false
    }

    /// All group ids in pre-order (parents before children), root first.
    pub fn preorder(&self) -> Vec<GroupId> {
        let mut out = Vec::with_capacity(self.len());
        self.collect_preorder(self.root, &mut out);
        out
    }

    fn collect_preorder(&self, idx: NodeIndex, out: &mut Vec<GroupId>) {
        out.push(self.graph[idx].id);
        if let Some(order) = self.child_order.get(&idx) {
            for &child in order {
                self.collect_preorder(child, out);
            }
        }
    }

    /// Ids of `id` and all its descendants, in pre-order.
    pub fn subtree_ids(&self, id: GroupId) -> Vec<GroupId> {
        let mut out = Vec::new();
        if let Some(&idx) = self.id_index.get(&id) {
            self.collect_preorder(idx, &mut out);
        }
        out
    }

    /// Groups carrying a physics binding, in pre-order.
    pub fn bound_groups(&self) -> Vec<GroupId> {
        self.preorder()
            .into_iter()
            .filter(|id| self.get(*id).is_some_and(|g| g.physics.is_some()))
            .collect()
    }

    // ─── Transforms ──────────────────────────────────────────────────────

    /// Composition of all ancestors' transforms and the group's own.
    pub fn world_transform(&self, id: GroupId) -> Option<Affine> {
        let idx = *self.id_index.get(&id)?;
        Some(self.world_at(idx))
    }

    fn world_at(&self, idx: NodeIndex) -> Affine {
        let local = self.graph[idx].transform.to_affine();
        match self.parent_index(idx) {
            Some(parent) => self.world_at(parent) * local,
            None => local,
        }
    }

    /// World transform of the group's parent (identity for the root).
    pub fn parent_world_transform(&self, id: GroupId) -> Affine {
        self.id_index
            .get(&id)
            .and_then(|idx| self.parent_index(*idx))
            .map(|p| self.world_at(p))
            .unwrap_or(Affine::IDENTITY)
    }

    /// Replace a group's local transform, returning the previous one.
    pub fn set_transform(&mut self, id: GroupId, transform: Transform) -> CoreResult<Transform> {
        let group = self.group_mut(id)?;
        Ok(std::mem::replace(&mut group.transform, transform))
    }

    /// World-space bounds of every stroke in the subtree.
    pub fn world_bounds(&self, id: GroupId) -> Option<Rect> {
        let mut out: Option<Rect> = None;
        for gid in self.subtree_ids(id) {
            let (Some(group), Some(world)) = (self.get(gid), self.world_transform(gid)) else {
                continue;
            };
            if let Some(b) = group.content_bounds() {
                let r = world.transform_rect_bbox(b);
                out = Some(out.map_or(r, |acc| acc.union(r)));
            }
        }
        out
    }

    // ─── Visibility ──────────────────────────────────────────────────────

    /// Set the visibility flag, returning the previous value.
    pub fn set_visible(&mut self, id: GroupId, visible: bool) -> CoreResult<bool> {
        let group = self.group_mut(id)?;
        Ok(std::mem::replace(&mut group.visible, visible))
    }

    /// A group is shown only when it and every ancestor are visible.
    pub fn effective_visible(&self, id: GroupId) -> bool {
        let Some(&start) = self.id_index.get(&id) else {
            return false;
        };
        let mut current = Some(start);
        while let Some(idx) = current {
            if !self.graph[idx].visible {
                return false;
            }
            current = self.parent_index(idx);
        }
        true
    }

    // ─── Structure ───────────────────────────────────────────────────────

    fn check_can_hold_children(&self, parent: NodeIndex) -> CoreResult<()> {
        if self.kind_at(parent) == GroupKind::Leaf {
            return Err(HierarchyError::LeafCannotHaveChildren.into());
        }
        Ok(())
    }

    fn link(&mut self, parent: NodeIndex, child: NodeIndex, position: Option<usize>) {
        self.graph.add_edge(parent, child, ());
        let order = self.child_order.entry(parent).or_default();
        let at = position.unwrap_or(order.len()).min(order.len());
        order.insert(at, child);
    }

    fn unlink(&mut self, child: NodeIndex) -> Option<(NodeIndex, usize)> {
        let parent = self.parent_index(child)?;
        if let Some(edge) = self.graph.find_edge(parent, child) {
            self.graph.remove_edge(edge);
        }
        let order = self.child_order.get_mut(&parent)?;
        let position = order.iter().position(|c| *c == child)?;
        order.remove(position);
        if order.is_empty() {
            self.child_order.remove(&parent);
        }
        Some((parent, position))
    }

    /// Add a new, empty group under `parent`, on top of its siblings.
    pub fn create_child(&mut self, parent: GroupId) -> CoreResult<GroupId> {
        let group = DrawingGroup::new(GroupId::generate());
        let id = group.id;
        self.insert(parent, group, None)?;
        Ok(id)
    }

    /// Insert a prepared group under `parent`. `position` defaults to the end.
    pub fn insert(
        &mut self,
        parent: GroupId,
        group: DrawingGroup,
        position: Option<usize>,
    ) -> CoreResult<()> {
        let parent_idx = self.index(parent)?;
        if self.contains(group.id) {
            return Err(HierarchyError::DuplicateGroup.into());
        }
        self.check_can_hold_children(parent_idx)?;

        let id = group.id;
        let idx = self.graph.add_node(group);
        self.id_index.insert(id, idx);
        self.link(parent_idx, idx, position);
        log::debug!("insert {id} under {parent}");
        Ok(())
    }

    /// Append a stroke to a leaf (or empty) group.
    pub fn add_stroke(&mut self, id: GroupId, stroke: Stroke) -> CoreResult<()> {
        let idx = self.index(id)?;
        if idx == self.root || self.kind_at(idx) == GroupKind::Composite {
            return Err(HierarchyError::CompositeCannotHaveStrokes.into());
        }
        self.graph[idx].strokes.push(stroke);
        Ok(())
    }

    /// Move `id` under `new_parent` at `position`, keeping its local transform.
    pub fn move_to(&mut self, id: GroupId, new_parent: GroupId, position: Option<usize>) -> CoreResult<()> {
        let idx = self.index(id)?;
        let parent_idx = self.index(new_parent)?;
        if idx == self.root {
            return Err(HierarchyError::RootIsFixed.into());
        }
        if id == new_parent || self.is_ancestor_of(id, new_parent) {
            return Err(HierarchyError::CycleDetected.into());
        }
        self.check_can_hold_children(parent_idx)?;

        self.unlink(idx);
        self.link(parent_idx, idx, position);
        Ok(())
    }

    /// Move `id` under `new_parent` (appended), keeping its world transform.
    pub fn reparent(&mut self, id: GroupId, new_parent: GroupId) -> CoreResult<()> {
        let world = self.world_transform(id).ok_or(CoreError::UnknownGroup(id))?;
        self.move_to(id, new_parent, None)?;

        let parent_world = self.parent_world_transform(id);
        let group = self.group_mut(id)?;
        group.transform = Transform::from_affine(parent_world.inverse() * world, group.transform.pivot);
        log::debug!("reparent {id} under {new_parent}");
        Ok(())
    }

    /// Remove a group and all its descendants.
    pub fn remove(&mut self, id: GroupId) -> CoreResult<DetachedGroup> {
        let idx = self.index(id)?;
        if idx == self.root {
            return Err(HierarchyError::RootIsFixed.into());
        }
        let subtree = self.extract(idx);
        let (parent, position) = self.unlink(idx).ok_or(CoreError::UnknownGroup(id))?;
        let parent = self.graph[parent].id;
        for gid in subtree.ids() {
            if let Some(i) = self.id_index.remove(&gid) {
                self.child_order.remove(&i);
                self.graph.remove_node(i);
            }
        }
        log::debug!("remove {id} ({} groups)", subtree.ids().len());
        Ok(DetachedGroup {
            parent,
            position,
            subtree,
        })
    }

    fn extract(&self, idx: NodeIndex) -> GroupSubtree {
        GroupSubtree {
            group: self.graph[idx].clone(),
            children: self
                .child_order
                .get(&idx)
                .map(|order| order.iter().map(|c| self.extract(*c)).collect())
                .unwrap_or_default(),
        }
    }

    /// Snapshot of a group and its descendants.
    pub fn subtree(&self, id: GroupId) -> Option<GroupSubtree> {
        self.id_index.get(&id).map(|idx| self.extract(*idx))
    }

    /// Re-insert a previously removed subtree at its former position.
    pub fn restore(&mut self, detached: &DetachedGroup) -> CoreResult<()> {
        let parent_idx = self.index(detached.parent)?;
        if let Some(dup) = detached.subtree.ids().into_iter().find(|id| self.contains(*id)) {
            log::warn!("cannot restore {}: {dup} already present", detached.subtree.id());
            return Err(HierarchyError::DuplicateGroup.into());
        }
        self.check_can_hold_children(parent_idx)?;
        self.insert_subtree(parent_idx, &detached.subtree, Some(detached.position));
        Ok(())
    }

    fn insert_subtree(&mut self, parent: NodeIndex, subtree: &GroupSubtree, position: Option<usize>) {
        let idx = self.graph.add_node(subtree.group.clone());
        self.id_index.insert(subtree.group.id, idx);
        self.link(parent, idx, position);
        for child in &subtree.children {
            self.insert_subtree(idx, child, None);
        }
    }

    /// Create `group` under `parent` at `position` and move `members` into
    /// it, in order, giving each the paired transform.
    ///
    /// `position` is the index in `parent` once the members have left it.
    pub fn form_group(
        &mut self,
        group: DrawingGroup,
        parent: GroupId,
        position: usize,
        members: &[(GroupId, Transform)],
    ) -> CoreResult<()> {
        let parent_idx = self.index(parent)?;
        if self.contains(group.id) {
            return Err(HierarchyError::DuplicateGroup.into());
        }
        if !group.strokes.is_empty() {
            return Err(HierarchyError::CompositeCannotHaveStrokes.into());
        }
        for (member, _) in members {
            let idx = self.index(*member)?;
            if idx == self.root {
                return Err(HierarchyError::RootIsFixed.into());
            }
            if *member == parent || self.is_ancestor_of(*member, parent) {
                return Err(HierarchyError::CycleDetected.into());
            }
        }
        // The parent may only become valid once the members have left it.
        let parent_keeps_strokes = !self.graph[parent_idx].strokes.is_empty();
        if parent_keeps_strokes {
            return Err(HierarchyError::LeafCannotHaveChildren.into());
        }

        let group_id = group.id;
        let group_idx = self.graph.add_node(group);
        self.id_index.insert(group_id, group_idx);
        for (member, transform) in members {
            let idx = self.id_index[member];
            self.unlink(idx);
            self.link(group_idx, idx, None);
            self.graph[idx].transform = *transform;
        }
        self.link(parent_idx, group_idx, Some(position));
        log::debug!("group {} members into {group_id}", members.len());
        Ok(())
    }

    /// Inverse of `form_group`: move the group's children to their
    /// placements (applied in ascending position order) and delete the now
    /// empty group node.
    pub fn dissolve_group(&mut self, id: GroupId, placements: &[Placement]) -> CoreResult<DrawingGroup> {
        let idx = self.index(id)?;
        if idx == self.root {
            return Err(HierarchyError::RootIsFixed.into());
        }
        let children = self.children(id);
        for p in placements {
            if !children.contains(&p.id) {
                return Err(CoreError::UnknownGroup(p.id));
            }
            let target = self.index(p.parent)?;
            if p.parent == id || self.is_ancestor_of(id, p.parent) {
                return Err(HierarchyError::CycleDetected.into());
            }
            if !self.graph[target].strokes.is_empty() {
                return Err(HierarchyError::LeafCannotHaveChildren.into());
            }
        }

        self.unlink(idx);
        let mut ordered: Vec<&Placement> = placements.iter().collect();
        ordered.sort_by_key(|p| p.position);
        for p in ordered {
            let child = self.id_index[&p.id];
            let target = self.id_index[&p.parent];
            self.unlink(child);
            self.link(target, child, Some(p.position));
            self.graph[child].transform = p.transform;
        }

        // Any child without a placement goes down with the group.
        for gid in self.subtree_ids(id).into_iter().skip(1) {
            if let Some(i) = self.id_index.remove(&gid) {
                self.child_order.remove(&i);
                self.graph.remove_node(i);
            }
        }
        self.id_index.remove(&id);
        self.child_order.remove(&idx);
        let group = self.graph.remove_node(idx).ok_or(CoreError::UnknownGroup(id))?;
        log::debug!("dissolve {id} into {} placements", placements.len());
        Ok(group)
    }

    // ─── Physics binding ─────────────────────────────────────────────────

    /// Derive a collision polygon from the group's strokes and bind it.
    /// Returns the previous binding.
    pub fn bind_physics(
        &mut self,
        id: GroupId,
        body_type: BodyType,
        material: Material,
        params: &SimplifyParams,
    ) -> CoreResult<Option<PhysicsBinding>> {
        let shape = self.collision_shape(id, params)?;
        self.set_binding(
            id,
            Some(PhysicsBinding {
                body_type,
                material,
                shape,
            }),
        )
    }

    /// Replace the binding verbatim (used by undo), returning the previous one.
    pub fn set_binding(&mut self, id: GroupId, binding: Option<PhysicsBinding>) -> CoreResult<Option<PhysicsBinding>> {
        let idx = self.index(id)?;
        if idx == self.root {
            return Err(HierarchyError::RootIsFixed.into());
        }
        Ok(std::mem::replace(&mut self.graph[idx].physics, binding))
    }

    pub fn unbind_physics(&mut self, id: GroupId) -> CoreResult<Option<PhysicsBinding>> {
        self.set_binding(id, None)
    }

    /// Convex collision polygon for a group, in its content coordinates.
    ///
    /// Each stroke is simplified on its own; composites pull in every
    /// descendant stroke mapped into their own content space.
    pub fn collision_shape(&self, id: GroupId, params: &SimplifyParams) -> CoreResult<Vec<Point>> {
        let idx = self.index(id)?;
        if idx == self.root {
            return Err(HierarchyError::RootIsFixed.into());
        }
        if self.kind_at(idx) == GroupKind::Empty {
            return Err(HierarchyError::EmptyGroup.into());
        }

        let to_content = self.world_at(idx).inverse();

        let mut simplified = Vec::new();
        for gid in self.subtree_ids(id) {
            let Some(group) = self.get(gid) else {
                continue;
            };
            let map = if gid == id {
                Affine::IDENTITY
            } else {
                to_content * self.world_transform(gid).unwrap_or(Affine::IDENTITY)
            };
            for stroke in &group.strokes {
                let mapped: Vec<Point> = stroke.points.iter().map(|p| map * *p).collect();
                simplified.extend(simplify_to_range(&mapped, params).points);
            }
        }

        let mut hull = convex_hull(&simplified);
        if hull.len() > params.high_target {
            // The union of per-stroke outlines can exceed the band again.
            let mut ring = hull.clone();
            ring.push(hull[0]);
            let reduced = convex_hull(&simplify_to_range(&ring, params).points);
            hull = trim_convex(&reduced, params.high_target);
        }
        if is_degenerate_shape(&hull) {
            return Err(CoreError::UnsimplifiableShape {
                group: id,
                vertices: hull.len(),
            });
        }
        Ok(hull)
    }
}

impl Default for GroupTree {
    fn default() -> Self {
        Self::new()
    }
}
