pub mod commands;
pub mod theme;
pub mod trace;
pub mod types;

pub use commands::{Fill, RenderCommand, TextAnchor};
pub use theme::{Background, ColorHash, Palette};
pub use trace::{ContextId, Phase, TraceDocument, TraceEvent};
pub use types::{Point, Rect, Rgb};
