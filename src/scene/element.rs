use crate::foundation::core::Rect;

fn one() -> f32 {
    1.0
}

/// Content of a non-scene clip.
///
/// Only `solid` and `image` are drawn by the built-in CPU stage; `custom` elements (text, charts,
/// video snippets) are handed to whatever [`crate::Stage`] the caller installs.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Element {
    /// Flat color fill. `rect: None` covers the canvas.
    Solid {
        /// Straight-alpha RGBA8.
        color: [u8; 4],
        /// Placement in canvas pixels.
        #[serde(default)]
        rect: Option<Rect>,
        /// Opacity multiplier.
        #[serde(default = "one")]
        opacity: f32,
    },
    /// Raster image scaled into `rect`.
    Image {
        /// Asset path, relative to the asset root.
        source: String,
        /// Placement in canvas pixels. `None` uses the image's own size at the origin.
        #[serde(default)]
        rect: Option<Rect>,
        /// Opacity multiplier.
        #[serde(default = "one")]
        opacity: f32,
    },
    /// Container that only contributes timing to its children.
    Group,
    /// Opaque element for an external stage.
    Custom {
        /// Element type understood by the stage.
        kind: String,
        /// Free-form parameters.
        #[serde(default)]
        params: serde_json::Value,
    },
    /// In-scene overlap marker. Neighboring clips hide while it runs.
    Transition,
}

impl Element {
    /// Return `true` for the in-scene transition marker.
    pub fn is_transition(&self) -> bool {
        matches!(self, Self::Transition)
    }

    /// Return `true` when the element can own child clips.
    pub fn is_container(&self) -> bool {
        matches!(self, Self::Group)
    }

    /// Asset path this element depends on, if any.
    pub fn asset_source(&self) -> Option<&str> {
        match self {
            Self::Image { source, .. } => Some(source),
            _ => None,
        }
    }
}
