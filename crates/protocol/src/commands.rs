use serde::{Deserialize, Serialize};

use crate::types::{Point, Rect, Rgb};

/// A single, stateless render instruction.
///
/// Views emit a `Vec<RenderCommand>`; renderers consume the list
/// sequentially. Groups nest, and every command carries all the data it
/// needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RenderCommand {
    /// Fill a rectangle. `corner_radius` of zero draws square corners.
    DrawRect {
        rect: Rect,
        fill: Fill,
        corner_radius: f64,
    },

    /// Draw a text string. `id` and `class` are forwarded so interactive
    /// renderers can address the element.
    DrawText {
        position: Point,
        text: String,
        anchor: TextAnchor,
        id: Option<String>,
        class: Option<String>,
    },

    /// Begin a logical group. `title` is the hover tooltip of the group.
    BeginGroup {
        id: Option<String>,
        title: Option<String>,
    },

    /// End the current group.
    EndGroup,
}

/// Fill of a rectangle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Fill {
    Color(Rgb),
    /// Reference to a paint server defined by the renderer (e.g. the
    /// background gradient).
    Reference(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextAnchor {
    #[default]
    Start,
    Middle,
}
