//! Editor configuration.

use crate::pen::PenStyle;
use ps_core::SimplifyParams;
use ps_physics::WorldConfig;

/// Settings for a `SceneComposer`.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorConfig {
    /// Undo entries kept before the oldest is dropped. Default: **100**.
    pub history_depth: usize,

    /// Shortest timeline, in seconds, regardless of keyframes. Default: **10.0**.
    pub min_duration: f64,

    /// Vertex band and threshold search used when binding physics.
    pub simplify: SimplifyParams,

    /// Simulator tuning for playback.
    pub physics: WorldConfig,

    /// Pen samples closer than this to the previous one are dropped. Default: **1.0**.
    pub pen_min_spacing: f64,

    /// Extra distance around strokes that still counts as a hit. Default: **6.0**.
    pub hit_tolerance: f64,

    /// Pen style before the first `SetPen`.
    pub default_pen: PenStyle,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history_depth: 100,
            min_duration: 10.0,
            simplify: SimplifyParams::default(),
            physics: WorldConfig::default(),
            pen_min_spacing: 1.0,
            hit_tolerance: 6.0,
            default_pen: PenStyle::default(),
        }
    }
}
