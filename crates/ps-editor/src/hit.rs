//! Hit testing: canvas point → group lookup.
//!
//! Reverse-walks the group tree (front-to-back) so the topmost stroke under
//! the pointer wins.

use kurbo::{Point, Rect};
use ps_core::simplify::segment_distance;
use ps_core::{GroupId, GroupTree};

/// Find the topmost visible leaf group with a stroke within `tolerance`
/// of `p` (world space). Returns `None` over empty canvas.
pub fn hit_test(tree: &GroupTree, p: Point, tolerance: f64) -> Option<GroupId> {
    hit_test_group(tree, tree.root(), p, tolerance)
}

fn hit_test_group(tree: &GroupTree, id: GroupId, p: Point, tolerance: f64) -> Option<GroupId> {
    let group = tree.get(id)?;
    if !group.visible {
        return None;
    }

    // Children in reverse (topmost first)
    for child in tree.children(id).into_iter().rev() {
        if let Some(hit) = hit_test_group(tree, child, p, tolerance) {
            return Some(hit);
        }
    }

    let world = tree.world_transform(id)?;
    for stroke in &group.strokes {
        let reach = tolerance + stroke.width / 2.0;
        let pts: Vec<Point> = stroke.points.iter().map(|q| world * *q).collect();
        let hit = match pts.as_slice() {
            [single] => single.distance(p) <= reach,
            _ => pts.windows(2).any(|w| segment_distance(p, w[0], w[1]) <= reach),
        };
        if hit {
            return Some(id);
        }
    }
    None
}

/// Top-level groups (children of the root) whose visible strokes touch
/// `rect`. Used for marquee selection.
pub fn hit_test_rect(tree: &GroupTree, rect: Rect) -> Vec<GroupId> {
    let rect = rect.abs();
    tree.children(tree.root())
        .into_iter()
        .filter(|id| tree.effective_visible(*id))
        .filter(|id| {
            tree.world_bounds(*id).is_some_and(|b| {
                b.x0 <= rect.x1 && rect.x0 <= b.x1 && b.y0 <= rect.y1 && rect.y0 <= b.y1
            })
        })
        .collect()
}

/// The ancestor of `id` directly under the root (or `id` itself).
pub fn top_level_ancestor(tree: &GroupTree, id: GroupId) -> Option<GroupId> {
    let root = tree.root();
    let mut current = id;
    loop {
        match tree.parent(current)? {
            parent if parent == root => return Some(current),
            parent => current = parent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use ps_core::{Color, DrawingGroup, Stroke, Vec2};

    fn line(tree: &mut GroupTree, parent: GroupId, from: Point, to: Point) -> GroupId {
        let group = DrawingGroup::from_stroke(GroupId::generate(), Stroke::new(vec![from, to], Color::BLACK, 2.0));
        let id = group.id;
        tree.insert(parent, group, None).unwrap();
        id
    }

    #[test]
    fn topmost_stroke_wins() {
        let mut tree = GroupTree::new();
        let root = tree.root();
        let below = line(&mut tree, root, Point::new(0.0, 0.0), Point::new(100.0, 0.0));
        let above = line(&mut tree, root, Point::new(50.0, -50.0), Point::new(50.0, 50.0));
        assert_eq!(hit_test(&tree, Point::new(50.0, 1.0), 2.0), Some(above));
        assert_eq!(hit_test(&tree, Point::new(10.0, 1.0), 2.0), Some(below));
        assert_eq!(hit_test(&tree, Point::new(10.0, 30.0), 2.0), None);
    }

    #[test]
    fn hit_follows_transform_and_visibility() {
        let mut tree = GroupTree::new();
        let root = tree.root();
        let a = line(&mut tree, root, Point::new(0.0, 0.0), Point::new(10.0, 0.0));
        let moved = tree.get(a).unwrap().transform.translated(Vec2::new(0.0, 100.0));
        tree.set_transform(a, moved).unwrap();
        assert_eq!(hit_test(&tree, Point::new(5.0, 0.0), 1.0), None);
        assert_eq!(hit_test(&tree, Point::new(5.0, 100.0), 1.0), Some(a));

        tree.set_visible(a, false).unwrap();
        assert_eq!(hit_test(&tree, Point::new(5.0, 100.0), 1.0), None);
    }

    #[test]
    fn marquee_returns_top_level_groups() {
        let mut tree = GroupTree::new();
        let root = tree.root();
        let outer = tree.create_child(root).unwrap();
        let inner = line(&mut tree, outer, Point::new(0.0, 0.0), Point::new(10.0, 10.0));
        let far = line(&mut tree, root, Point::new(500.0, 500.0), Point::new(510.0, 510.0));
        assert_eq!(hit_test_rect(&tree, Rect::new(-5.0, -5.0, 5.0, 5.0)), vec![outer]);
        assert_eq!(top_level_ancestor(&tree, inner), Some(outer));
        assert_eq!(top_level_ancestor(&tree, far), Some(far));
        assert_eq!(top_level_ancestor(&tree, root), None);
    }
}
