//! Per-frame scene snapshot handed to the renderer.

use kurbo::{Affine, Point};
use ps_core::{GroupId, Stroke};
use serde::{Deserialize, Serialize};

/// One group as it should be drawn this frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSnapshot {
    pub id: GroupId,
    /// `None` for the root.
    pub parent: Option<GroupId>,
    pub world: Affine,
    /// Effective visibility (the group and all its ancestors).
    pub visible: bool,
    /// Pose driven by a moving physics body.
    pub simulated: bool,
    /// Strokes in content coordinates; map through `world` to draw.
    pub strokes: Vec<Stroke>,
}

/// Keyframed pivot positions of a selected group, in world space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionPath {
    pub group: GroupId,
    pub points: Vec<Point>,
}

/// Everything the UI needs to draw one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneSnapshot {
    pub time: f64,
    pub duration: f64,
    pub playing: bool,
    pub recording: bool,
    /// Pre-order: parents before children, back to front.
    pub groups: Vec<GroupSnapshot>,
    pub selection: Vec<GroupId>,
    pub motion_paths: Vec<MotionPath>,
    /// Stroke being drawn, in world space.
    pub pending_stroke: Vec<Point>,
    pub can_undo: bool,
    pub can_redo: bool,
}

impl SceneSnapshot {
    pub fn group(&self, id: GroupId) -> Option<&GroupSnapshot> {
        self.groups.iter().find(|g| g.id == id)
    }

    /// Compact binary encoding for export collaborators.
    pub fn to_msgpack(&self) -> Result<Vec<u8>, rmp_serde::encode::Error> {
        rmp_serde::to_vec_named(self)
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, rmp_serde::decode::Error> {
        rmp_serde::from_slice(bytes)
    }
}
