//! Maps bound drawing groups onto simulator bodies and back.
//!
//! At build time each bound group's collision polygon is carried into world
//! space and becomes a body centred on the polygon's centroid `c₀`, angle 0.
//! Later, a body at centroid `c` and angle `θ` moves its group to
//!
//! ```text
//! W' = T(c) · R(θ) · T(-c₀) · W₀
//! ```
//!
//! where `W₀` is the group's world transform at build time. The group's
//! local transform is then `P⁻¹ · W'` for the current parent world `P`,
//! decomposed about the group's pivot.

use crate::body::{BodyDesc, RigidBodyHandle};
use crate::error::{PhysicsError, PhysicsResult};
use crate::world::{PhysicsWorld, WorldConfig};
use kurbo::{Affine, Point, Vec2};
use ps_core::transform::{affine_rotation, shortest_angle};
use ps_core::{BodyType, GroupId, GroupTree, Transform};

#[derive(Debug, Clone)]
struct BoundBody {
    group: GroupId,
    handle: RigidBodyHandle,
    body_type: BodyType,
    start_world: Affine,
    start_centroid: Point,
}

impl BoundBody {
    /// Body placement (centroid, angle) that puts the group at `world`.
    fn body_target(&self, world: Affine) -> (Point, f64) {
        let motion = world * self.start_world.inverse();
        (motion * self.start_centroid, affine_rotation(motion))
    }
}

/// Owns the simulator for one playback run.
#[derive(Debug)]
pub struct PhysicsBridge {
    world: PhysicsWorld,
    /// Pre-order, so parents are written back before their children.
    entries: Vec<BoundBody>,
    excluded: Vec<GroupId>,
    /// Local transforms of moving groups before they were first simulated.
    /// Survives rebuilds; cleared on teardown.
    rest_poses: Vec<(GroupId, Transform)>,
    start_time: f64,
    built: bool,
}

impl PhysicsBridge {
    pub fn new(config: WorldConfig) -> Self {
        Self {
            world: PhysicsWorld::new(config),
            entries: Vec::new(),
            excluded: Vec::new(),
            rest_poses: Vec::new(),
            start_time: 0.0,
            built: false,
        }
    }

    pub fn is_built(&self) -> bool {
        self.built
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn body_count(&self) -> usize {
        self.entries.len()
    }

    pub fn world(&self) -> &PhysicsWorld {
        &self.world
    }

    /// Bound groups left out of the last build because their world shape
    /// was degenerate.
    pub fn excluded(&self) -> &[GroupId] {
        &self.excluded
    }

    /// Whether the group's pose comes from a moving body.
    pub fn is_simulated(&self, group: GroupId) -> bool {
        self.entries
            .iter()
            .any(|e| e.group == group && e.body_type != BodyType::Static)
    }

    pub fn has_body(&self, group: GroupId) -> bool {
        self.entries.iter().any(|e| e.group == group)
    }

    /// Create one body per bound, effectively visible group, replacing any
    /// previous world. Rest poses recorded by an earlier build are kept.
    pub fn build(&mut self, tree: &GroupTree, start_time: f64) {
        self.world.clear();
        self.entries.clear();
        self.excluded.clear();

        for id in tree.bound_groups() {
            if !tree.effective_visible(id) {
                continue;
            }
            let (Some(group), Some(world)) = (tree.get(id), tree.world_transform(id)) else {
                continue;
            };
            let Some(binding) = &group.physics else {
                continue;
            };
            let points: Vec<Point> = binding.shape.iter().map(|p| world * *p).collect();
            let Some(desc) = BodyDesc::from_world_points(binding.body_type, binding.material, &points) else {
                log::warn!("{id}: collision shape is degenerate in world space, not simulated");
                self.excluded.push(id);
                continue;
            };
            let start_centroid = desc.position;
            let handle = match self.world.create_body(desc) {
                Ok(handle) => handle,
                Err(err) => {
                    log::warn!("{id}: {err}, not simulated");
                    self.excluded.push(id);
                    continue;
                }
            };
            self.entries.push(BoundBody {
                group: id,
                handle,
                body_type: binding.body_type,
                start_world: world,
                start_centroid,
            });
            if binding.body_type != BodyType::Static && !self.rest_poses.iter().any(|(g, _)| *g == id) {
                self.rest_poses.push((id, group.transform));
            }
        }

        self.start_time = start_time;
        self.built = true;
        log::debug!(
            "physics built at t={start_time:.3}: {} bodies, {} excluded",
            self.entries.len(),
            self.excluded.len()
        );
    }

    /// Steer kinematic bodies so they reach `target(group)` (a world
    /// transform) after `dt` seconds.
    pub fn drive_kinematic(&mut self, dt: f64, mut target: impl FnMut(GroupId) -> Option<Affine>) {
        if dt <= 0.0 || !dt.is_finite() {
            return;
        }
        for entry in self.entries.iter().filter(|e| e.body_type == BodyType::Kinematic) {
            let Some(world) = target(entry.group) else {
                continue;
            };
            let Some((position, angle)) = self.world.body_pose(entry.handle) else {
                continue;
            };
            let (goal, goal_angle) = entry.body_target(world);
            let linear: Vec2 = (goal - position) / dt;
            let angular = shortest_angle(angle, goal_angle) / dt;
            if let Err(err) = self.world.set_velocity(entry.handle, linear, angular) {
                log::warn!("{}: {err}", entry.group);
            }
        }
    }

    /// Advance the simulation and write dynamic and kinematic poses back.
    pub fn step(&mut self, tree: &mut GroupTree, dt: f64) -> PhysicsResult<usize> {
        if !self.built {
            return Err(PhysicsError::SimulationRebuildRequired);
        }
        let substeps = self.world.step(dt);
        log::trace!("physics step dt={dt:.4}: {substeps} substeps");

        for entry in &self.entries {
            if entry.body_type == BodyType::Static {
                continue;
            }
            let Some((position, angle)) = self.world.body_pose(entry.handle) else {
                continue;
            };
            let Some(pivot) = tree.get(entry.group).map(|g| g.transform.pivot) else {
                continue;
            };
            let world = Affine::translate(position.to_vec2())
                * Affine::rotate(angle)
                * Affine::translate(-entry.start_centroid.to_vec2())
                * entry.start_world;
            let parent = tree.parent_world_transform(entry.group);
            let local = Transform::from_affine(parent.inverse() * world, pivot);
            if let Err(err) = tree.set_transform(entry.group, local) {
                log::warn!("{}: writeback failed: {err}", entry.group);
            }
        }
        Ok(substeps)
    }

    /// Destroy every body. With `restore`, moved groups go back to the
    /// pose they had before they were first simulated.
    pub fn teardown(&mut self, tree: &mut GroupTree, restore: bool) {
        let rest_poses = std::mem::take(&mut self.rest_poses);
        if restore {
            for (id, rest) in rest_poses {
                if tree.contains(id) {
                    let _ = tree.set_transform(id, rest);
                }
            }
        }
        if self.built {
            log::debug!("physics torn down (restore={restore})");
        }
        self.world.clear();
        self.entries.clear();
        self.excluded.clear();
        self.built = false;
    }

    /// Drop the body of a group that left the scene.
    pub fn remove_group(&mut self, group: GroupId) -> bool {
        let Some(at) = self.entries.iter().position(|e| e.group == group) else {
            return false;
        };
        let entry = self.entries.remove(at);
        if let Err(err) = self.world.remove_body(entry.handle) {
            log::warn!("{group}: {err}");
        }
        true
    }

    /// Keep the group's current transform through the next teardown (it
    /// was edited by hand after simulating).
    pub fn forget_rest_pose(&mut self, group: GroupId) {
        self.rest_poses.retain(|(g, _)| *g != group);
    }

    /// Drop bodies (and rest poses) of groups for which `keep` is false.
    pub fn retain_groups(&mut self, mut keep: impl FnMut(GroupId) -> bool) {
        let gone: Vec<GroupId> = self.entries.iter().map(|e| e.group).filter(|g| !keep(*g)).collect();
        for group in gone {
            self.remove_group(group);
        }
        self.rest_poses.retain(|(g, _)| keep(*g));
    }
}

impl Default for PhysicsBridge {
    fn default() -> Self {
        Self::new(WorldConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ps_core::simplify::SimplifyParams;
    use ps_core::{Color, DrawingGroup, Material, Stroke};

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
            1.0,
        )
    }

    fn bound(tree: &mut GroupTree, stroke: Stroke, body_type: BodyType) -> GroupId {
        let group = DrawingGroup::from_stroke(GroupId::generate(), stroke);
        let id = group.id;
        tree.insert(tree.root(), group, None).unwrap();
        tree.bind_physics(id, body_type, Material::default(), &SimplifyParams::default())
            .unwrap();
        id
    }

    #[test]
    fn step_before_build_needs_rebuild() {
        let mut tree = GroupTree::new();
        let mut bridge = PhysicsBridge::default();
        assert_eq!(bridge.step(&mut tree, 0.1), Err(PhysicsError::SimulationRebuildRequired));
    }

    #[test]
    fn dynamic_group_falls_and_static_stays() {
        let mut tree = GroupTree::new();
        let ground = bound(&mut tree, rect_stroke(-100.0, -20.0, 200.0, 20.0), BodyType::Static);
        let ball = bound(&mut tree, rect_stroke(-5.0, 100.0, 10.0, 10.0), BodyType::Dynamic);
        let ground_before = tree.get(ground).unwrap().transform;

        let mut bridge = PhysicsBridge::default();
        bridge.build(&tree, 0.0);
        assert_eq!(bridge.body_count(), 2);
        assert!(bridge.is_simulated(ball));
        assert!(!bridge.is_simulated(ground));

        bridge.step(&mut tree, 1.0 / 60.0).unwrap();
        assert!(tree.get(ball).unwrap().transform.translation.y < 0.0);
        assert_eq!(tree.get(ground).unwrap().transform, ground_before);
    }

    #[test]
    fn teardown_restores_rest_pose() {
        let mut tree = GroupTree::new();
        let ball = bound(&mut tree, rect_stroke(0.0, 0.0, 10.0, 10.0), BodyType::Dynamic);
        let rest = tree.get(ball).unwrap().transform;
        let mut bridge = PhysicsBridge::default();
        bridge.build(&tree, 0.0);
        for _ in 0..10 {
            bridge.step(&mut tree, 1.0 / 60.0).unwrap();
        }
        assert_ne!(tree.get(ball).unwrap().transform, rest);
        bridge.teardown(&mut tree, true);
        assert_eq!(tree.get(ball).unwrap().transform, rest);
        assert!(!bridge.is_built());
    }

    #[test]
    fn zero_scale_group_is_excluded() {
        let mut tree = GroupTree::new();
        let ball = bound(&mut tree, rect_stroke(0.0, 0.0, 10.0, 10.0), BodyType::Dynamic);
        let mut squashed = tree.get(ball).unwrap().transform;
        squashed.scale = Vec2::new(0.0, 1.0);
        tree.set_transform(ball, squashed).unwrap();

        let mut bridge = PhysicsBridge::default();
        bridge.build(&tree, 0.0);
        assert_eq!(bridge.body_count(), 0);
        assert_eq!(bridge.excluded(), &[ball]);
        assert!(!bridge.is_simulated(ball));
    }

    #[test]
    fn kinematic_body_tracks_target() {
        let mut tree = GroupTree::new();
        let paddle = bound(&mut tree, rect_stroke(0.0, 0.0, 40.0, 10.0), BodyType::Kinematic);
        let mut bridge = PhysicsBridge::default();
        bridge.build(&tree, 0.0);

        let target = Affine::translate((30.0, 0.0)) * tree.world_transform(paddle).unwrap();
        bridge.drive_kinematic(0.5, |_| Some(target));
        for _ in 0..30 {
            bridge.step(&mut tree, 1.0 / 60.0).unwrap();
        }
        let t = tree.get(paddle).unwrap().transform;
        assert!((t.translation.x - 30.0).abs() < 1e-3, "paddle at {:?}", t.translation);
        assert!(t.translation.y.abs() < 1e-4);
    }
}
