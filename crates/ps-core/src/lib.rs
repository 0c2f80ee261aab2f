pub mod error;
pub mod id;
pub mod model;
pub mod simplify;
pub mod timeline;
pub mod transform;

pub use error::{CoreError, CoreResult, HierarchyError};
pub use id::GroupId;
pub use model::*;
pub use simplify::{SimplifyParams, Simplified, simplify_to_range};
pub use timeline::{Keyframe, KeyframeTrack, Timeline};
pub use transform::Transform;

// Re-export kurbo geometry so downstream crates share one version
pub use kurbo::{Affine, Point, Rect, Vec2};
