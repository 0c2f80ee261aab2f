//! Fixed-step rigid-body world on top of rapier2d.
//!
//! Every rapier step uses the same `IntegrationParameters::dt`, and a world
//! is always rebuilt from empty sets, so the same bodies stepped with the
//! same sequence of `step` calls give the same poses.

use crate::body::BodyDesc;
use crate::error::{PhysicsError, PhysicsResult};
use kurbo::{Point, Vec2};
use rapier2d::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Simulator tuning. Units are canvas units (points) and seconds, y up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldConfig {
    /// Default: **(0, -980)**.
    pub gravity: Vec2,
    /// Length of one rapier step. Default: **1/120 s**.
    pub fixed_dt: f64,
    /// Rapier steps allowed per `step` call. Time beyond that stays pending
    /// and is worked off by later calls. Default: **16**.
    pub max_substeps: usize,
    /// Canvas units per "metre" for rapier's length tolerances. Default: **100.0**.
    pub length_unit: f64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            gravity: Vec2::new(0.0, -980.0),
            fixed_dt: 1.0 / 120.0,
            max_substeps: 16,
            length_unit: 100.0,
        }
    }
}

pub struct PhysicsWorld {
    config: WorldConfig,
    params: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: BroadPhaseBvh,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    accumulator: f64,
}

impl PhysicsWorld {
    pub fn new(config: WorldConfig) -> Self {
        let mut params = IntegrationParameters::default();
        params.dt = config.fixed_dt as Real;
        params.length_unit = config.length_unit as Real;
        Self {
            config,
            params,
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: BroadPhaseBvh::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            accumulator: 0.0,
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn create_body(&mut self, desc: BodyDesc) -> PhysicsResult<RigidBodyHandle> {
        let collider = desc.collider().ok_or(PhysicsError::InvalidShape(desc.vertices.len()))?;
        let handle = self.bodies.insert(desc.rigid_body());
        self.colliders.insert_with_parent(collider, handle, &mut self.bodies);
        Ok(handle)
    }

    /// Remove a body together with its collider.
    pub fn remove_body(&mut self, handle: RigidBodyHandle) -> PhysicsResult<()> {
        self.bodies
            .remove(
                handle,
                &mut self.islands,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                true,
            )
            .map(|_| ())
            .ok_or(PhysicsError::UnknownBody(handle))
    }

    pub fn body(&self, handle: RigidBodyHandle) -> Option<&RigidBody> {
        self.bodies.get(handle)
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Assign a body's velocity. Fixed bodies ignore it.
    pub fn set_velocity(&mut self, handle: RigidBodyHandle, linear: Vec2, angular: f64) -> PhysicsResult<()> {
        let body = self.bodies.get_mut(handle).ok_or(PhysicsError::UnknownBody(handle))?;
        if !body.is_fixed() {
            body.set_linvel(vector![linear.x as Real, linear.y as Real], true);
            body.set_angvel(angular as Real, true);
        }
        Ok(())
    }

    /// Advance by `dt` seconds in fixed rapier steps. Returns the number of
    /// steps taken. Time that does not fill a whole step, or that exceeds
    /// `max_substeps`, is carried into the next call.
    pub fn step(&mut self, dt: f64) -> usize {
        if !(dt.is_finite() && dt > 0.0) {
            return 0;
        }
        let h = self.config.fixed_dt;
        self.accumulator += dt;
        let mut substeps = 0;
        while self.accumulator + 1e-9 >= h && substeps < self.config.max_substeps {
            self.substep();
            self.accumulator -= h;
            substeps += 1;
        }
        if self.accumulator >= h {
            log::trace!("physics behind by {:.4}s, carried forward", self.accumulator);
        }
        self.accumulator = self.accumulator.max(0.0);
        substeps
    }

    /// Simulated time not yet covered by a rapier step.
    pub fn pending_time(&self) -> f64 {
        self.accumulator
    }

    fn substep(&mut self) {
        let gravity = vector![self.config.gravity.x as Real, self.config.gravity.y as Real];
        self.pipeline.step(
            &gravity,
            &self.params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            &(),
            &(),
        );
    }

    /// Drop all bodies, solver state and pending time.
    pub fn clear(&mut self) {
        *self = Self::new(self.config);
    }

    /// Body origin (the centroid it was created at) and angle.
    pub fn body_pose(&self, handle: RigidBodyHandle) -> Option<(Point, f64)> {
        self.bodies.get(handle).map(|b| {
            let t = b.translation();
            (Point::new(t.x as f64, t.y as f64), b.rotation().angle() as f64)
        })
    }
}

impl fmt::Debug for PhysicsWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhysicsWorld")
            .field("config", &self.config)
            .field("bodies", &self.bodies.len())
            .field("accumulator", &self.accumulator)
            .finish()
    }
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new(WorldConfig::default())
    }
}
