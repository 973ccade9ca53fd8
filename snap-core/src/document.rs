//! The editor document: every visual parameter of the current edit.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::frame::{FrameInsets, FrameKind};
use crate::overlay::{OverlayId, TextOverlay};
use crate::store;
use crate::style::{Background, Color};
use crate::EditorError;

/// Smallest crop width/height, in percent of the image.
pub const MIN_CROP_PERCENT: f32 = 10.0;

/// Pixel dimensions of the composited canvas at 1x.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanvasSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl CanvasSize {
    /// Size multiplied by an integer export scale.
    #[must_use]
    pub fn scaled(self, scale: ExportScale) -> Self {
        let s = u32::from(scale.get());
        Self {
            width: self.width.saturating_mul(s),
            height: self.height.saturating_mul(s),
        }
    }

    /// Total pixel count.
    #[must_use]
    pub fn pixels(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// An axis-aligned rectangle in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
}

/// An axis-aligned rectangle in floating-point canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Width.
    pub width: f32,
    /// Height.
    pub height: f32,
}

impl Rect {
    /// Create a rectangle.
    #[must_use]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether the point lies inside (edges inclusive).
    #[must_use]
    pub fn contains(&self, px: f32, py: f32) -> bool {
        px >= self.x && px <= self.x + self.width && py >= self.y && py <= self.y + self.height
    }

    /// Center point.
    #[must_use]
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// The uploaded image as the document sees it: dimensions only.
///
/// Pixels live with the renderer; a committed crop narrows which part of
/// the source is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    /// Width of the decoded source.
    pub width: u32,
    /// Height of the decoded source.
    pub height: u32,
    /// Region of the source in use after a committed crop.
    pub source_crop: Option<PixelRect>,
}

impl ImageRef {
    /// A freshly loaded, uncropped image.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            source_crop: None,
        }
    }

    /// The part of the source that is drawn.
    #[must_use]
    pub fn visible_rect(&self) -> PixelRect {
        self.source_crop.unwrap_or(PixelRect {
            x: 0,
            y: 0,
            width: self.width,
            height: self.height,
        })
    }

    /// Dimensions after the committed crop.
    #[must_use]
    pub fn effective_size(&self) -> (u32, u32) {
        let r = self.visible_rect();
        (r.width, r.height)
    }

    /// Check the dimensions and that a committed crop lies inside the source.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::InvalidValue`] for an empty image or a crop
    /// that is empty or reaches past the source.
    pub fn check(&self) -> Result<(), EditorError> {
        if self.width == 0 || self.height == 0 {
            return Err(EditorError::InvalidValue(format!(
                "image dimensions must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        let Some(crop) = self.source_crop else {
            return Ok(());
        };
        let inside = |start: u32, len: u32, limit: u32| {
            len > 0 && start.checked_add(len).is_some_and(|end| end <= limit)
        };
        if inside(crop.x, crop.width, self.width) && inside(crop.y, crop.height, self.height) {
            Ok(())
        } else {
            Err(EditorError::InvalidValue(format!(
                "source crop {}x{} at ({}, {}) does not fit the {}x{} image",
                crop.width, crop.height, crop.x, crop.y, self.width, self.height
            )))
        }
    }
}

/// Layout parameters of the image on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    /// Space between the canvas edge and the frame, in pixels.
    pub padding: u32,
    /// Corner radius of the image (and frame), in pixels.
    pub border_radius: f32,
    /// Zoom of the image within its slot (1.0 = fit).
    pub image_scale: f32,
    /// Rotation of the image around its center, in degrees.
    pub rotation_deg: f32,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            padding: 64,
            border_radius: 12.0,
            image_scale: 1.0,
            rotation_deg: 0.0,
        }
    }
}

/// Drop shadow beneath the image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Shadow {
    /// Blur radius in pixels.
    pub blur: f32,
    /// Opacity (0.0..=1.0). Zero disables the shadow.
    pub opacity: f32,
    /// Shadow color.
    pub color: Color,
    /// Horizontal offset in pixels.
    pub offset_x: f32,
    /// Vertical offset in pixels.
    pub offset_y: f32,
}

impl Default for Shadow {
    fn default() -> Self {
        Self {
            blur: 30.0,
            opacity: 0.35,
            color: Color::BLACK,
            offset_x: 0.0,
            offset_y: 12.0,
        }
    }
}

impl Shadow {
    /// Whether the shadow draws anything.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.opacity > 0.0 && self.color.a > 0
    }
}

/// Encoded output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// PNG, lossless with alpha.
    #[default]
    Png,
    /// JPEG, lossy, no alpha.
    Jpeg,
    /// WebP (lossless), with alpha.
    Webp,
}

impl ExportFormat {
    /// All supported formats.
    pub const ALL: [Self; 3] = [Self::Png, Self::Jpeg, Self::Webp];

    /// MIME type.
    #[must_use]
    pub const fn mime(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
        }
    }

    /// File extension without the dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Webp => "webp",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Png => "PNG",
            Self::Jpeg => "JPEG",
            Self::Webp => "WebP",
        };
        f.write_str(name)
    }
}

impl FromStr for ExportFormat {
    type Err = EditorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "webp" => Ok(Self::Webp),
            other => Err(EditorError::InvalidValue(format!(
                "unsupported export format '{other}'"
            ))),
        }
    }
}

/// Integer export scale, 1x through 4x.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ExportScale(u8);

impl ExportScale {
    /// 1x.
    pub const X1: Self = Self(1);
    /// 2x.
    pub const X2: Self = Self(2);
    /// 3x.
    pub const X3: Self = Self(3);
    /// 4x.
    pub const X4: Self = Self(4);
    /// Every supported scale, ascending.
    pub const ALL: [Self; 4] = [Self::X1, Self::X2, Self::X3, Self::X4];

    /// The numeric factor.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }

    /// The next smaller scale, if any.
    #[must_use]
    pub const fn lower(self) -> Option<Self> {
        if self.0 > 1 {
            Some(Self(self.0 - 1))
        } else {
            None
        }
    }
}

impl Default for ExportScale {
    fn default() -> Self {
        Self::X2
    }
}

impl TryFrom<u8> for ExportScale {
    type Error = EditorError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if (1..=4).contains(&value) {
            Ok(Self(value))
        } else {
            Err(EditorError::InvalidValue(format!(
                "export scale must be 1-4, got {value}"
            )))
        }
    }
}

impl From<ExportScale> for u8 {
    fn from(scale: ExportScale) -> Self {
        scale.0
    }
}

impl fmt::Display for ExportScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.0)
    }
}

/// Export preferences stored with the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSettings {
    /// Output format.
    pub format: ExportFormat,
    /// Output scale.
    pub scale: ExportScale,
    /// JPEG quality 1-100.
    pub jpeg_quality: u8,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            format: ExportFormat::Png,
            scale: ExportScale::X2,
            jpeg_quality: 92,
        }
    }
}

/// In-progress crop selection, in percent of the visible image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropArea {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
}

impl CropArea {
    /// The whole image.
    pub const FULL: Self = Self {
        x: 0.0,
        y: 0.0,
        width: 100.0,
        height: 100.0,
    };

    /// Build a crop area, enforcing the minimum size and keeping it inside
    /// the image.
    #[must_use]
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        let sanitize = |v: f32, fallback: f32| if v.is_finite() { v } else { fallback };
        let width = sanitize(width, 100.0).clamp(MIN_CROP_PERCENT, 100.0);
        let height = sanitize(height, 100.0).clamp(MIN_CROP_PERCENT, 100.0);
        Self {
            x: sanitize(x, 0.0).clamp(0.0, 100.0 - width),
            y: sanitize(y, 0.0).clamp(0.0, 100.0 - height),
            width,
            height,
        }
    }

    /// Left edge in percent.
    #[must_use]
    pub fn x(&self) -> f32 {
        self.x
    }

    /// Top edge in percent.
    #[must_use]
    pub fn y(&self) -> f32 {
        self.y
    }

    /// Width in percent.
    #[must_use]
    pub fn width(&self) -> f32 {
        self.width
    }

    /// Height in percent.
    #[must_use]
    pub fn height(&self) -> f32 {
        self.height
    }

    /// Convert to pixels of a `width`×`height` image. The result is at least
    /// one pixel in each direction and never leaves the image.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn to_pixels(&self, width: u32, height: u32) -> PixelRect {
        let px = |pct: f32, total: u32| ((pct / 100.0) * total as f32).round() as u32;
        let x = px(self.x, width).min(width.saturating_sub(1));
        let y = px(self.y, height).min(height.saturating_sub(1));
        PixelRect {
            x,
            y,
            width: px(self.width, width).min(width - x).max(1),
            height: px(self.height, height).min(height - y).max(1),
        }
    }
}

impl Default for CropArea {
    fn default() -> Self {
        Self::FULL
    }
}

/// Every visual parameter of the current edit.
///
/// Missing fields deserialize to their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorDocument {
    /// The uploaded image, if any.
    pub image: Option<ImageRef>,
    /// Canvas background.
    pub background: Background,
    /// Image layout.
    pub geometry: Geometry,
    /// Drop shadow.
    pub shadow: Shadow,
    /// Frame chrome.
    pub frame: FrameKind,
    /// Text overlays, drawn in order.
    pub overlays: Vec<TextOverlay>,
    /// Crop selection; present only while cropping.
    pub crop: Option<CropArea>,
    /// Export preferences.
    pub export: ExportSettings,
    /// Bumped whenever the overlay list changes.
    #[serde(skip)]
    pub(crate) overlay_revision: u64,
}

impl EditorDocument {
    /// An empty document with default styling.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a document from JSON, re-applying every invariant that plain
    /// deserialization cannot enforce.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or two overlays share an ID.
    pub fn from_json(json: &str) -> Result<Self, EditorError> {
        let doc: Self = serde_json::from_str(json)?;
        doc.validated()
    }

    /// Re-apply the reducer's invariants to a document built from untrusted
    /// input. Values the reducer clamps are clamped; values it rejects are
    /// rejected.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::DuplicateOverlay`] if two overlays share an ID,
    /// and [`EditorError::InvalidValue`] for an image that fails
    /// [`ImageRef::check`], padding over [`MAX_PADDING`](crate::store::MAX_PADDING),
    /// non-finite geometry or shadow values, or a JPEG quality outside 1-100.
    pub fn validated(mut self) -> Result<Self, EditorError> {
        if let Some(image) = &self.image {
            image.check()?;
        }
        self.geometry = store::sanitize_geometry(self.geometry)?;
        self.shadow = store::sanitize_shadow(&self.shadow)?;
        store::check_jpeg_quality(self.export.jpeg_quality)?;

        let mut seen = std::collections::HashSet::new();
        for overlay in &mut self.overlays {
            if !seen.insert(overlay.id) {
                return Err(EditorError::DuplicateOverlay(overlay.id));
            }
            overlay.normalize();
        }
        self.crop = self
            .crop
            .map(|c| CropArea::new(c.x, c.y, c.width, c.height));
        Ok(self)
    }

    /// Serialize the document to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, EditorError> {
        serde_json::to_string(self).map_err(EditorError::Serialization)
    }

    /// Whether the user is currently cropping.
    #[must_use]
    pub fn is_cropping(&self) -> bool {
        self.crop.is_some()
    }

    /// The insets of the current frame.
    #[must_use]
    pub fn frame_insets(&self) -> FrameInsets {
        self.frame.insets()
    }

    /// Canvas size at 1x, derived from the image, padding and frame.
    ///
    /// `None` until an image is loaded.
    #[must_use]
    pub fn canvas_size(&self) -> Option<CanvasSize> {
        let image = self.image?;
        let (w, h) = image.effective_size();
        let insets = self.frame_insets();
        let pad = self.geometry.padding.saturating_mul(2);
        Some(CanvasSize {
            width: w.saturating_add(pad).saturating_add(insets.horizontal()),
            height: h.saturating_add(pad).saturating_add(insets.vertical()),
        })
    }

    /// Where the frame (or the bare image, without a frame) sits at 1x.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn frame_rect(&self) -> Option<Rect> {
        let (w, h) = self.image?.effective_size();
        let insets = self.frame_insets();
        let pad = self.geometry.padding as f32;
        Some(Rect::new(
            pad,
            pad,
            (w + insets.horizontal()) as f32,
            (h + insets.vertical()) as f32,
        ))
    }

    /// The image slot inside the frame at 1x, before zoom and rotation.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn image_rect(&self) -> Option<Rect> {
        let (w, h) = self.image?.effective_size();
        let insets = self.frame_insets();
        let pad = self.geometry.padding as f32;
        Some(Rect::new(
            pad + insets.left as f32,
            pad + insets.top as f32,
            w as f32,
            h as f32,
        ))
    }

    /// Find an overlay by ID.
    #[must_use]
    pub fn overlay(&self, id: OverlayId) -> Option<&TextOverlay> {
        self.overlays.iter().find(|o| o.id == id)
    }

    pub(crate) fn overlay_mut(&mut self, id: OverlayId) -> Option<&mut TextOverlay> {
        self.overlays.iter_mut().find(|o| o.id == id)
    }

    /// Counter that changes whenever overlays are added, edited, moved or
    /// removed.
    #[must_use]
    pub fn overlay_revision(&self) -> u64 {
        self.overlay_revision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_with_image(w: u32, h: u32) -> EditorDocument {
        EditorDocument {
            image: Some(ImageRef::new(w, h)),
            ..EditorDocument::default()
        }
    }

    #[test]
    fn test_canvas_size_includes_padding_and_frame() {
        let mut doc = doc_with_image(2000, 1500);
        doc.geometry.padding = 100;
        doc.frame = FrameKind::Browser;

        let size = doc.canvas_size().expect("image loaded");
        assert_eq!(size.width, 2000 + 200);
        assert_eq!(size.height, 1500 + 200 + crate::frame::BROWSER_BAR_HEIGHT);
    }

    #[test]
    fn test_canvas_size_none_without_image() {
        assert!(EditorDocument::new().canvas_size().is_none());
    }

    #[test]
    fn test_canvas_size_uses_committed_crop() {
        let mut doc = doc_with_image(1000, 800);
        doc.geometry.padding = 0;
        if let Some(image) = doc.image.as_mut() {
            image.source_crop = Some(PixelRect {
                x: 100,
                y: 100,
                width: 500,
                height: 400,
            });
        }
        let size = doc.canvas_size().expect("image loaded");
        assert_eq!((size.width, size.height), (500, 400));
    }

    #[test]
    fn test_image_rect_sits_inside_frame() {
        let mut doc = doc_with_image(400, 300);
        doc.geometry.padding = 20;
        doc.frame = FrameKind::Iphone;
        let frame = doc.frame_rect().expect("frame");
        let image = doc.image_rect().expect("image");
        assert!(image.x > frame.x && image.y > frame.y);
        assert!((frame.width - image.width - 32.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_crop_area_enforces_minimum() {
        let crop = CropArea::new(95.0, -5.0, 2.0, 500.0);
        assert!((crop.width() - MIN_CROP_PERCENT).abs() < f32::EPSILON);
        assert!((crop.height() - 100.0).abs() < f32::EPSILON);
        assert!((crop.x() - 90.0).abs() < f32::EPSILON);
        assert!((crop.y() - 0.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_crop_to_pixels_stays_inside() {
        let crop = CropArea::new(50.0, 50.0, 50.0, 50.0);
        let px = crop.to_pixels(201, 101);
        assert!(px.x + px.width <= 201);
        assert!(px.y + px.height <= 101);
        assert!(px.width >= 1 && px.height >= 1);
    }

    #[test]
    fn test_export_scale_bounds() {
        assert!(ExportScale::try_from(0).is_err());
        assert!(ExportScale::try_from(5).is_err());
        assert_eq!(ExportScale::X3.lower(), Some(ExportScale::X2));
        assert_eq!(ExportScale::X1.lower(), None);
    }

    #[test]
    fn test_from_json_rejects_duplicate_overlays() {
        let overlay = TextOverlay::new("dup");
        let mut doc = doc_with_image(10, 10);
        doc.overlays = vec![overlay.clone(), overlay];
        let json = doc.to_json().expect("serialize");
        assert!(matches!(
            EditorDocument::from_json(&json),
            Err(EditorError::DuplicateOverlay(_))
        ));
    }

    #[test]
    fn test_validated_rejects_crop_outside_image() {
        let mut doc = doc_with_image(40, 30);
        if let Some(image) = doc.image.as_mut() {
            image.source_crop = Some(PixelRect {
                x: 5000,
                y: 0,
                width: 10,
                height: 10,
            });
        }
        assert!(matches!(doc.clone().validated(), Err(EditorError::InvalidValue(_))));

        if let Some(image) = doc.image.as_mut() {
            image.source_crop = Some(PixelRect {
                x: 0,
                y: 0,
                width: 0,
                height: 30,
            });
        }
        assert!(doc.clone().validated().is_err());

        if let Some(image) = doc.image.as_mut() {
            image.source_crop = Some(PixelRect {
                x: u32::MAX,
                y: 0,
                width: 2,
                height: 30,
            });
        }
        assert!(doc.clone().validated().is_err());

        if let Some(image) = doc.image.as_mut() {
            image.source_crop = Some(PixelRect {
                x: 30,
                y: 20,
                width: 10,
                height: 10,
            });
        }
        assert!(doc.validated().is_ok());
    }

    #[test]
    fn test_validated_applies_reducer_limits() {
        let mut doc = doc_with_image(40, 30);
        doc.geometry.padding = crate::store::MAX_PADDING + 1;
        assert!(doc.clone().validated().is_err());

        doc.geometry.padding = 10;
        doc.export.jpeg_quality = 0;
        assert!(doc.clone().validated().is_err());

        doc.export.jpeg_quality = 80;
        doc.geometry.image_scale = 50.0;
        doc.geometry.border_radius = -4.0;
        doc.geometry.rotation_deg = 270.0;
        doc.shadow.opacity = 7.0;
        doc.shadow.blur = -1.0;
        let doc = doc.validated().expect("clamped");
        assert!((doc.geometry.image_scale - crate::store::MAX_IMAGE_SCALE).abs() < f32::EPSILON);
        assert!(doc.geometry.border_radius.abs() < f32::EPSILON);
        assert!((doc.geometry.rotation_deg + 90.0).abs() < f32::EPSILON);
        assert!((doc.shadow.opacity - 1.0).abs() < f32::EPSILON);
        assert!(doc.shadow.blur.abs() < f32::EPSILON);
    }

    #[test]
    fn test_validated_rejects_non_finite_shadow() {
        let mut doc = doc_with_image(40, 30);
        doc.shadow.offset_x = f32::NAN;
        assert!(doc.validated().is_err());
    }

    #[test]
    fn test_from_json_clamps_overlay_positions() {
        let json = serde_json::json!({
            "image": { "width": 10, "height": 10, "source_crop": null },
            "background": { "type": "transparent" },
            "geometry": { "padding": 0, "border_radius": 0.0, "image_scale": 1.0, "rotation_deg": 0.0 },
            "shadow": { "blur": 0.0, "opacity": 0.0, "color": "#000000", "offset_x": 0.0, "offset_y": 0.0 },
            "frame": "none",
            "overlays": [{
                "id": uuid::Uuid::new_v4(),
                "text": "far away",
                "x": 250.0,
                "y": -3.0,
                "font": { "family": "sans-serif", "size": 20.0, "weight": 400 },
                "fill": { "type": "solid", "color": "#ffffff" }
            }],
            "crop": null,
            "export": { "format": "png", "scale": 1, "jpeg_quality": 90 }
        });
        let doc = EditorDocument::from_json(&json.to_string()).expect("parse");
        assert!((doc.overlays[0].x() - 100.0).abs() < f32::EPSILON);
        assert!((doc.overlays[0].y() - 0.0).abs() < f32::EPSILON);
    }
}
