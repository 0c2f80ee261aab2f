//! Integration tests: bound groups → bodies → poses written back.

use kurbo::Point;
use ps_core::simplify::SimplifyParams;
use ps_core::{BodyType, Color, DrawingGroup, GroupId, GroupTree, Material, Stroke, Transform};
use ps_physics::PhysicsBridge;
use std::f64::consts::TAU;

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn rect_stroke(x: f64, y: f64, w: f64, h: f64) -> Stroke {
    Stroke::new(
        vec![
            Point::new(x, y),
            Point::new(x + w, y),
            Point::new(x + w, y + h),
            Point::new(x, y + h),
            Point::new(x, y),
        ],
        Color::BLACK,
        2.0,
    )
}

fn add_bound(tree: &mut GroupTree, stroke: Stroke, body_type: BodyType, material: Material) -> GroupId {
    let group = DrawingGroup::from_stroke(GroupId::generate(), stroke);
    let id = group.id;
    let root = tree.root();
    tree.insert(root, group, None).unwrap();
    tree.bind_physics(id, body_type, material, &SimplifyParams::default())
        .unwrap();
    id
}

/// Static ground with its top edge at y = 0 and a dynamic box above it.
fn ground_and_box() -> (GroupTree, GroupId, GroupId) {
    let still = Material {
        restitution: 0.0,
        ..Material::default()
    };
    let mut tree = GroupTree::new();
    let ground = add_bound(&mut tree, rect_stroke(-300.0, -40.0, 600.0, 40.0), BodyType::Static, still);
    let block = add_bound(&mut tree, rect_stroke(-15.0, 120.0, 30.0, 30.0), BodyType::Dynamic, still);
    (tree, ground, block)
}

fn lowest_y(tree: &GroupTree, id: GroupId) -> f64 {
    tree.world_bounds(id).unwrap().y0
}

/// Closed freehand-ish circle: `n` samples with a slight radial wobble.
fn circle_stroke(cx: f64, cy: f64, r: f64, n: usize) -> Stroke {
    let mut points: Vec<Point> = (0..n)
        .map(|i| {
            let a = TAU * i as f64 / n as f64;
            let rr = r + 0.8 * (5.0 * a).sin();
            Point::new(cx + rr * a.cos(), cy + rr * a.sin())
        })
        .collect();
    points.push(points[0]);
    Stroke::new(points, Color::BLACK, 2.0)
}

/// Lowest point of the group's collision polygon in world space.
fn shape_bottom(tree: &GroupTree, id: GroupId) -> f64 {
    let world = tree.world_transform(id).unwrap();
    let binding = tree.get(id).unwrap().physics.as_ref().unwrap();
    binding
        .shape
        .iter()
        .map(|p| (world * *p).y)
        .fold(f64::INFINITY, f64::min)
}

// ─── Falling and resting ─────────────────────────────────────────────────

#[test]
fn dynamic_body_falls_then_rests_on_ground() {
    init_logs();
    let (mut tree, ground, block) = ground_and_box();
    let ground_transform = tree.get(ground).unwrap().transform;
    let mut bridge = PhysicsBridge::default();
    bridge.build(&tree, 0.0);

    let mut previous = lowest_y(&tree, block);
    for _ in 0..300 {
        bridge.step(&mut tree, 1.0 / 60.0).unwrap();
        let y = lowest_y(&tree, block);
        if previous > 1.0 {
            assert!(y < previous, "rose from {previous} to {y} while airborne");
        } else {
            // Only contact correction may lift it back out of the ground.
            assert!(y <= previous + 2.0, "bounced from {previous} to {y}");
        }
        previous = y;
    }

    let bottom = lowest_y(&tree, block);
    assert!(bottom > -1.0, "penetrated ground: {bottom}");
    assert!(bottom < 1.0, "hovering above ground: {bottom}");
    assert_eq!(tree.get(ground).unwrap().transform, ground_transform);
}

#[test]
fn drawn_circle_falls_onto_ground_and_settles() {
    init_logs();
    let still = Material {
        restitution: 0.0,
        ..Material::default()
    };
    let mut tree = GroupTree::new();
    add_bound(&mut tree, rect_stroke(-300.0, -40.0, 600.0, 40.0), BodyType::Static, still);
    let ball = add_bound(&mut tree, circle_stroke(0.0, 200.0, 40.0, 64), BodyType::Dynamic, still);
    let polygon = tree.get(ball).unwrap().physics.as_ref().unwrap().shape.len();
    assert!((4..=8).contains(&polygon), "{polygon} vertices");

    let mut bridge = PhysicsBridge::default();
    bridge.build(&tree, 0.0);
    let mut previous = shape_bottom(&tree, ball);
    let mut landed = false;
    for _ in 0..600 {
        bridge.step(&mut tree, 1.0 / 60.0).unwrap();
        let y = shape_bottom(&tree, ball);
        if previous > 1.0 && !landed {
            assert!(y < previous, "rose from {previous} to {y} while airborne");
        }
        landed |= y <= 1.0;
        previous = y;
    }

    assert!(landed);
    let bottom = shape_bottom(&tree, ball);
    assert!(bottom > -1.0, "penetrated ground: {bottom}");
    assert!(bottom < 1.0, "hovering above ground: {bottom}");
}

#[test]
fn replay_is_deterministic() {
    let (tree, _, block) = ground_and_box();

    let run = || {
        let mut tree = tree.clone();
        let mut bridge = PhysicsBridge::default();
        bridge.build(&tree, 0.0);
        for i in 0..120 {
            // Uneven frame times still replay identically.
            let dt = if i % 3 == 0 { 1.0 / 50.0 } else { 1.0 / 60.0 };
            bridge.step(&mut tree, dt).unwrap();
        }
        tree.get(block).unwrap().transform
    };

    assert_eq!(run(), run());
}

#[test]
fn rebuilding_mid_fall_replays_the_same_poses() {
    let (mut tree, _, block) = ground_and_box();
    let mut bridge = PhysicsBridge::default();

    // Simulate to t = 0.5 and keep that pose as the new starting point.
    bridge.build(&tree, 0.0);
    for _ in 0..30 {
        bridge.step(&mut tree, 1.0 / 60.0).unwrap();
    }
    bridge.teardown(&mut tree, false);
    let mid_fall = tree.get(block).unwrap().transform;

    let mut record = |tree: &mut GroupTree| -> Vec<Transform> {
        bridge.build(tree, 0.5);
        let poses = (0..90)
            .map(|_| {
                bridge.step(tree, 1.0 / 60.0).unwrap();
                tree.get(block).unwrap().transform
            })
            .collect();
        bridge.teardown(tree, true);
        poses
    };

    let first = record(&mut tree);
    assert_eq!(tree.get(block).unwrap().transform, mid_fall);
    let second = record(&mut tree);
    assert_eq!(first, second);
    assert_ne!(first[0], mid_fall);
}

#[test]
fn hidden_groups_are_not_simulated() {
    let (mut tree, _, block) = ground_and_box();
    tree.set_visible(block, false).unwrap();
    let mut bridge = PhysicsBridge::default();
    bridge.build(&tree, 0.0);
    assert_eq!(bridge.body_count(), 1);
    assert!(!bridge.has_body(block));
}

#[test]
fn removed_group_body_is_dropped() {
    let (mut tree, _, block) = ground_and_box();
    let mut bridge = PhysicsBridge::default();
    bridge.build(&tree, 2.0);
    assert_eq!(bridge.start_time(), 2.0);

    tree.remove(block).unwrap();
    assert!(bridge.remove_group(block));
    assert!(!bridge.remove_group(block));
    bridge.step(&mut tree, 1.0 / 60.0).unwrap();
    assert_eq!(bridge.world().len(), 1);
}
