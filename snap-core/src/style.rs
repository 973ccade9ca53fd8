//! Colors, gradients and background descriptors.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::EditorError;

/// An 8-bit straight-alpha RGBA color.
///
/// Serialized as `#rrggbb` (opaque) or `#rrggbbaa`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha channel (255 = opaque).
    pub a: u8,
}

impl Color {
    /// Opaque white.
    pub const WHITE: Self = Self::rgb(255, 255, 255);
    /// Opaque black.
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self::rgba(0, 0, 0, 0);

    /// Create an opaque color.
    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Create a color with alpha.
    #[must_use]
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Return this color with its alpha multiplied by `opacity` (0.0..=1.0).
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn with_opacity(self, opacity: f32) -> Self {
        let a = (f32::from(self.a) * opacity.clamp(0.0, 1.0)).round() as u8;
        Self { a, ..self }
    }

    /// Hex representation without the alpha channel, e.g. `#ff8800`.
    #[must_use]
    pub fn to_hex_rgb(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Alpha as a 0.0..=1.0 float.
    #[must_use]
    pub fn alpha_f32(self) -> f32 {
        f32::from(self.a) / 255.0
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 255 {
            write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            write!(
                f,
                "#{:02x}{:02x}{:02x}{:02x}",
                self.r, self.g, self.b, self.a
            )
        }
    }
}

impl FromStr for Color {
    type Err = EditorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || EditorError::InvalidValue(format!("invalid color '{s}'"));
        let hex = s.strip_prefix('#').ok_or_else(invalid)?;
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());

        match hex.len() {
            6 => Ok(Self::rgb(channel(0)?, channel(2)?, channel(4)?)),
            8 => Ok(Self::rgba(channel(0)?, channel(2)?, channel(4)?, channel(6)?)),
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for Color {
    type Error = EditorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

/// A color stop along a gradient.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradientStop {
    /// Position along the gradient (0.0..=1.0).
    pub offset: f32,
    /// Color at this position.
    pub color: Color,
}

impl GradientStop {
    /// Create a stop, clamping the offset into range.
    #[must_use]
    pub fn new(offset: f32, color: Color) -> Self {
        Self {
            offset: offset.clamp(0.0, 1.0),
            color,
        }
    }
}

/// A linear gradient described by an angle and stops.
///
/// The angle follows CSS: 0° points up, 90° points right.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearGradient {
    /// Direction in degrees.
    pub angle_deg: f32,
    /// At least two stops, in ascending offset order.
    pub stops: Vec<GradientStop>,
}

impl LinearGradient {
    /// Two-stop gradient between `from` and `to`.
    #[must_use]
    pub fn two_stop(angle_deg: f32, from: Color, to: Color) -> Self {
        Self {
            angle_deg,
            stops: vec![GradientStop::new(0.0, from), GradientStop::new(1.0, to)],
        }
    }

    /// Start and end points of the gradient line for a `width`×`height` box.
    ///
    /// The line passes through the center and is long enough for the corner
    /// colors to match the end stops, as CSS does.
    #[must_use]
    pub fn endpoints(&self, width: f32, height: f32) -> ((f32, f32), (f32, f32)) {
        let rad = self.angle_deg.to_radians();
        let (dx, dy) = (rad.sin(), -rad.cos());
        let half_len = (width * dx.abs() + height * dy.abs()) / 2.0;
        let (cx, cy) = (width / 2.0, height / 2.0);
        (
            (cx - dx * half_len, cy - dy * half_len),
            (cx + dx * half_len, cy + dy * half_len),
        )
    }
}

/// A colored control point of a mesh gradient.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeshPoint {
    /// Horizontal position in percent (0..=100).
    pub x: f32,
    /// Vertical position in percent (0..=100).
    pub y: f32,
    /// Color radiating from this point.
    pub color: Color,
}

/// The canvas background behind the image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Background {
    /// A single flat color.
    Solid {
        /// Fill color.
        color: Color,
    },
    /// A linear gradient across the whole canvas.
    Gradient {
        /// Gradient definition.
        gradient: LinearGradient,
    },
    /// Several soft color blobs over a base gradient.
    Mesh {
        /// Base gradient filling the canvas.
        base: LinearGradient,
        /// Color points blended on top.
        points: Vec<MeshPoint>,
    },
    /// A word or phrase repeated in rotated rows.
    TextPattern {
        /// The repeated text.
        text: String,
        /// Fill behind the text.
        background: Color,
        /// Text color.
        color: Color,
        /// Font size in canvas pixels.
        font_size: f32,
        /// Row rotation in degrees.
        angle_deg: f32,
    },
    /// Two colors separated by a horizontal sine wave.
    WaveSplit {
        /// Color above the wave.
        top: Color,
        /// Color below the wave.
        bottom: Color,
        /// Vertical position of the wave center (0.0..=1.0).
        split: f32,
        /// Wave height as a fraction of canvas height.
        amplitude: f32,
        /// Number of full waves across the width.
        frequency: f32,
    },
    /// The SnapBeautify mark stamped in a grid.
    LogoPattern {
        /// Fill behind the stamps.
        background: Color,
        /// Stamp color.
        color: Color,
        /// Stamp edge length in canvas pixels.
        size: f32,
        /// Gap between stamps in canvas pixels.
        spacing: f32,
    },
    /// No background; the export keeps an alpha channel.
    Transparent,
}

impl Default for Background {
    fn default() -> Self {
        Self::Gradient {
            gradient: LinearGradient::two_stop(
                135.0,
                Color::rgb(0x66, 0x7e, 0xea),
                Color::rgb(0x76, 0x4b, 0xa2),
            ),
        }
    }
}

impl Background {
    /// Whether the rendered background leaves pixels transparent.
    #[must_use]
    pub fn is_transparent(&self) -> bool {
        matches!(self, Self::Transparent)
    }

    /// Short name for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Solid { .. } => "solid",
            Self::Gradient { .. } => "gradient",
            Self::Mesh { .. } => "mesh",
            Self::TextPattern { .. } => "text_pattern",
            Self::WaveSplit { .. } => "wave_split",
            Self::LogoPattern { .. } => "logo_pattern",
            Self::Transparent => "transparent",
        }
    }
}
