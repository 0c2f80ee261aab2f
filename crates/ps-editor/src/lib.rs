pub mod commands;
pub mod config;
pub mod document;
pub mod error;
pub mod hit;
pub mod manipulator;
pub mod pen;
pub mod scene;
pub mod selection;
pub mod snapshot;

pub use commands::{Command, CommandStack};
pub use config::EditorConfig;
pub use document::Document;
pub use error::{EditorError, EditorResult};
pub use manipulator::{ManipulationDelta, Manipulator};
pub use pen::{PenStyle, PenTool};
pub use scene::{Frame, Intent, Outcome, SceneComposer};
pub use selection::Selection;
pub use snapshot::{GroupSnapshot, MotionPath, SceneSnapshot};
