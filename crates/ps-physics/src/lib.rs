//! 2D rigid-body physics for PlaySketch scenes.
//!
//! `world` wraps a rapier2d pipeline stepped at a fixed rate;
//! `bridge` connects it to a `ps_core::GroupTree`.

pub mod body;
pub mod bridge;
pub mod error;
pub mod world;

pub use body::{BodyDesc, RigidBodyHandle};
pub use bridge::PhysicsBridge;
pub use error::{PhysicsError, PhysicsResult};
pub use world::{PhysicsWorld, WorldConfig};

pub use rapier2d::prelude::{Real, RigidBodyType};
