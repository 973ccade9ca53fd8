//! Text overlays drawn on top of the composited image.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::style::{Color, LinearGradient};

/// Unique identifier for a text overlay within a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OverlayId(Uuid);

impl OverlayId {
    /// Create a new unique overlay ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from an existing UUID.
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for OverlayId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OverlayId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Clamp a percentage coordinate into `[0, 100]`. NaN maps to 0.
#[must_use]
pub fn clamp_percent(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

/// Font selection for an overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontSpec {
    /// CSS-style family list, e.g. `"Inter, sans-serif"`.
    pub family: String,
    /// Size in canvas pixels at 1x.
    pub size: f32,
    /// Weight (100..=900).
    pub weight: u16,
}

impl Default for FontSpec {
    fn default() -> Self {
        Self {
            family: "sans-serif".to_string(),
            size: 48.0,
            weight: 700,
        }
    }
}

/// How overlay glyphs are filled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextFill {
    /// Flat color.
    Solid {
        /// Glyph color.
        color: Color,
    },
    /// Gradient clipped to the glyph outlines.
    Gradient {
        /// Gradient across the text's bounding box.
        gradient: LinearGradient,
    },
}

impl Default for TextFill {
    fn default() -> Self {
        Self::Solid {
            color: Color::WHITE,
        }
    }
}

/// A text overlay. Position is the text's center in percent of the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextOverlay {
    /// Unique identifier.
    pub id: OverlayId,
    /// Text content.
    pub text: String,
    x: f32,
    y: f32,
    /// Font selection.
    pub font: FontSpec,
    /// Glyph fill.
    pub fill: TextFill,
}

impl TextOverlay {
    /// Create an overlay centered on the canvas.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: OverlayId::new(),
            text: text.into(),
            x: 50.0,
            y: 50.0,
            font: FontSpec::default(),
            fill: TextFill::default(),
        }
    }

    /// Set the position (clamped).
    #[must_use]
    pub fn at(mut self, x: f32, y: f32) -> Self {
        self.set_position(x, y);
        self
    }

    /// Set the font.
    #[must_use]
    pub fn with_font(mut self, font: FontSpec) -> Self {
        self.font = font;
        self
    }

    /// Set the fill.
    #[must_use]
    pub fn with_fill(mut self, fill: TextFill) -> Self {
        self.fill = fill;
        self
    }

    /// Horizontal center in percent.
    #[must_use]
    pub fn x(&self) -> f32 {
        self.x
    }

    /// Vertical center in percent.
    #[must_use]
    pub fn y(&self) -> f32 {
        self.y
    }

    /// Move the overlay. Coordinates are clamped into `[0, 100]`.
    pub fn set_position(&mut self, x: f32, y: f32) {
        self.x = clamp_percent(x);
        self.y = clamp_percent(y);
    }

    /// Re-clamp after deserializing untrusted input.
    pub(crate) fn normalize(&mut self) {
        self.set_position(self.x, self.y);
    }
}
