use rapier2d::prelude::RigidBodyHandle;

/// Errors returned by the simulator and the physics bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PhysicsError {
    /// The bridge has no world for the current scene; build it first.
    #[error("physics world must be rebuilt before stepping")]
    SimulationRebuildRequired,

    #[error("unknown body {0:?}")]
    UnknownBody(RigidBodyHandle),

    /// Rapier could not build a convex collider from the outline.
    #[error("no convex collider for a {0}-vertex outline")]
    InvalidShape(usize),
}

pub type PhysicsResult<T> = Result<T, PhysicsError>;
