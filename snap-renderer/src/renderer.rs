//! Compositing a document snapshot into pixels.
//!
//! Layers, bottom to top:
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  5. Text overlays            (SVG)          │
//! │  4. Frame chrome             (SVG, card)    │
//! │  3. Image                    (tiny-skia)    │
//! │  2. Shadow                   (SVG, card)    │
//! │  1. Background               (SVG)          │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! "Card" layers share one transform: the image zoom and rotation about
//! the frame's center.

use std::fmt::Write;
use std::sync::Arc;

use snap_core::{Rect, RenderSnapshot, Shadow};
use tiny_skia::{
    FillRule, FilterQuality, Mask, Path, PathBuilder, Pixmap, PixmapPaint, Transform,
};
use usvg::fontdb;

use crate::background::write_background;
use crate::chrome::{write_chrome, CardRadii};
use crate::error::{RenderError, RenderResult};
use crate::image::SourceImage;
use crate::svg::{font_database, rounded_rect_path, SvgLayer};
use crate::text::write_overlays;

/// Draws snapshots into caller-provided surfaces.
///
/// Rendering has no side effects beyond the target pixmap. The renderer
/// only holds the shared font database.
#[derive(Clone)]
pub struct Renderer {
    fonts: Arc<fontdb::Database>,
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("font_faces", &self.fonts.len())
            .finish()
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    /// Create a renderer using the system fonts.
    #[must_use]
    pub fn new() -> Self {
        Self {
            fonts: font_database(),
        }
    }

    /// Number of font faces available for text.
    #[must_use]
    pub fn font_faces(&self) -> usize {
        self.fonts.len()
    }

    /// Render `snapshot` into `surface` at `scale`.
    ///
    /// `surface` must measure the snapshot's canvas size times `scale`
    /// (rounded). With no source image this does nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the surface has the wrong size, the source does
    /// not match the document, or a vector layer fails to rasterize. Errors
    /// are not retried here.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn render(
        &self,
        snapshot: &RenderSnapshot,
        source: Option<&SourceImage>,
        surface: &mut Pixmap,
        scale: f32,
    ) -> RenderResult<()> {
        let Some(source) = source else {
            tracing::debug!("No source image, skipping render");
            return Ok(());
        };
        let document = snapshot.document();
        let Some(image_ref) = document.image else {
            return Ok(());
        };
        if (image_ref.width, image_ref.height) != (source.width(), source.height()) {
            return Err(RenderError::InvalidImage(format!(
                "source is {}x{}, document expects {}x{}",
                source.width(),
                source.height(),
                image_ref.width,
                image_ref.height
            )));
        }

        let canvas = snapshot.canvas();
        let expected_width = (canvas.width as f32 * scale).round() as u32;
        let expected_height = (canvas.height as f32 * scale).round() as u32;
        if (surface.width(), surface.height()) != (expected_width, expected_height) {
            return Err(RenderError::SurfaceMismatch {
                expected_width,
                expected_height,
                actual_width: surface.width(),
                actual_height: surface.height(),
            });
        }

        let (Some(frame), Some(slot)) = (document.frame_rect(), document.image_rect()) else {
            return Ok(());
        };
        let radii = CardRadii::for_frame(document.frame, document.geometry.border_radius);
        let card = card_transform(frame, document.geometry.image_scale, document.geometry.rotation_deg);
        let card_attr = svg_transform(frame, document.geometry.image_scale, document.geometry.rotation_deg);

        // 1-2. Background and shadow.
        let mut under = SvgLayer::new(canvas);
        write_background(&mut under, &document.background);
        if document.shadow.is_visible() {
            write_shadow(&mut under, &document.shadow, frame, radii.outer, &card_attr);
        }
        self.draw_layer(under, surface, scale)?;

        // 3. Image.
        let visible = source.region(image_ref.visible_rect())?;
        let device = card.post_scale(scale, scale);
        let mut mask = Mask::new(surface.width(), surface.height()).ok_or(RenderError::Allocation {
            width: surface.width(),
            height: surface.height(),
        })?;
        if let Some(clip) = rounded_rect(frame, radii.outer) {
            mask.fill_path(&clip, FillRule::Winding, true, device);
        }
        let paint = PixmapPaint {
            quality: FilterQuality::Bicubic,
            ..PixmapPaint::default()
        };
        surface.draw_pixmap(
            0,
            0,
            visible.as_ref(),
            &paint,
            device.pre_translate(slot.x, slot.y),
            Some(&mask),
        );

        // 4-5. Chrome and text.
        let mut over = SvgLayer::new(canvas);
        if document.frame != snap_core::FrameKind::None {
            let _ = write!(over.body(), "<g transform=\"{card_attr}\">");
            write_chrome(&mut over, document.frame, frame, slot, radii);
            over.body().push_str("</g>");
        }
        write_overlays(&mut over, &document.overlays);
        self.draw_layer(over, surface, scale)?;

        tracing::debug!(
            revision = snapshot.revision(),
            width = surface.width(),
            height = surface.height(),
            background = document.background.name(),
            overlays = document.overlays.len(),
            "Rendered snapshot"
        );
        Ok(())
    }

    fn draw_layer(&self, layer: SvgLayer, surface: &mut Pixmap, scale: f32) -> RenderResult<()> {
        layer.draw_with_fonts(surface, scale, Arc::clone(&self.fonts))
    }
}

fn card_transform(frame: Rect, zoom: f32, rotation_deg: f32) -> Transform {
    let (cx, cy) = frame.center();
    Transform::from_translate(cx, cy)
        .pre_concat(Transform::from_rotate(rotation_deg))
        .pre_scale(zoom, zoom)
        .pre_translate(-cx, -cy)
}

fn svg_transform(frame: Rect, zoom: f32, rotation_deg: f32) -> String {
    let (cx, cy) = frame.center();
    format!("translate({cx} {cy}) rotate({rotation_deg}) scale({zoom}) translate({} {})", -cx, -cy)
}

fn write_shadow(layer: &mut SvgLayer, shadow: &Shadow, frame: Rect, radius: f32, card_attr: &str) {
    let size = layer.size();
    let id = layer.next_id("shadow");
    let _ = write!(
        layer.defs(),
        "<filter id=\"{id}\" filterUnits=\"userSpaceOnUse\" x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\">\
         <feGaussianBlur stdDeviation=\"{}\"/></filter>",
        -i64::from(size.width),
        -i64::from(size.height),
        u64::from(size.width) * 3,
        u64::from(size.height) * 3,
        (shadow.blur / 2.0).max(0.0),
    );
    let offset = Rect::new(
        frame.x + shadow.offset_x,
        frame.y + shadow.offset_y,
        frame.width,
        frame.height,
    );
    let color = shadow.color.with_opacity(shadow.opacity);
    let _ = write!(
        layer.body(),
        "<g transform=\"{card_attr}\"><path d=\"{}\" {} filter=\"url(#{id})\"/></g>",
        rounded_rect_path(offset, radius),
        crate::svg::fill(color),
    );
}

/// A rounded rectangle as a tiny-skia path.
fn rounded_rect(rect: Rect, radius: f32) -> Option<Path> {
    let r = radius.max(0.0).min(rect.width / 2.0).min(rect.height / 2.0);
    if r <= 0.0 {
        let rect = tiny_skia::Rect::from_xywh(rect.x, rect.y, rect.width, rect.height)?;
        return Some(PathBuilder::from_rect(rect));
    }
    // Cubic approximation of a quarter circle.
    let k = r * 0.552_284_8;
    let (left, top) = (rect.x, rect.y);
    let (right, bottom) = (rect.x + rect.width, rect.y + rect.height);

    let mut pb = PathBuilder::new();
    pb.move_to(left + r, top);
    pb.line_to(right - r, top);
    pb.cubic_to(right - r + k, top, right, top + r - k, right, top + r);
    pb.line_to(right, bottom - r);
    pb.cubic_to(right, bottom - r + k, right - r + k, bottom, right - r, bottom);
    pb.line_to(left + r, bottom);
    pb.cubic_to(left + r - k, bottom, left, bottom - r + k, left, bottom - r);
    pb.line_to(left, top + r);
    pb.cubic_to(left, top + r - k, left + r - k, top, left + r, top);
    pb.close();
    pb.finish()
}

#[cfg(test)]
mod tests {
    use snap_core::{
        Background, Color, EditorDocument, FontSpec, FrameKind, Geometry, ImageRef, Shadow,
        TextOverlay,
    };

    use super::*;

    fn source(w: u32, h: u32, rgba: [u8; 4]) -> SourceImage {
        let data = rgba.repeat((w * h) as usize);
        SourceImage::from_rgba(w, h, data).expect("source")
    }

    fn snapshot(document: EditorDocument) -> RenderSnapshot {
        RenderSnapshot::from_document(document).expect("image loaded")
    }

    fn plain_document(w: u32, h: u32) -> EditorDocument {
        let mut document = EditorDocument::new();
        document.image = Some(ImageRef::new(w, h));
        document.background = Background::Solid {
            color: Color::rgb(0, 0, 255),
        };
        document.geometry = Geometry {
            padding: 10,
            border_radius: 0.0,
            image_scale: 1.0,
            rotation_deg: 0.0,
        };
        document.shadow = Shadow {
            opacity: 0.0,
            ..Shadow::default()
        };
        document
    }

    fn rgba(pixmap: &Pixmap, x: u32, y: u32) -> (u8, u8, u8, u8) {
        let c = pixmap.pixel(x, y).expect("pixel").demultiply();
        (c.red(), c.green(), c.blue(), c.alpha())
    }

    #[test]
    fn test_layers_in_place() {
        let snap = snapshot(plain_document(20, 10));
        assert_eq!((snap.canvas().width, snap.canvas().height), (40, 30));
        let mut surface = Pixmap::new(40, 30).expect("surface");
        Renderer::new()
            .render(&snap, Some(&source(20, 10, [255, 0, 0, 255])), &mut surface, 1.0)
            .expect("render");

        assert_eq!(rgba(&surface, 2, 2), (0, 0, 255, 255));
        assert_eq!(rgba(&surface, 20, 15), (255, 0, 0, 255));
    }

    #[test]
    fn test_scaled_render() {
        let snap = snapshot(plain_document(20, 10));
        let mut surface = Pixmap::new(80, 60).expect("surface");
        Renderer::new()
            .render(&snap, Some(&source(20, 10, [255, 0, 0, 255])), &mut surface, 2.0)
            .expect("render");
        assert_eq!(rgba(&surface, 40, 30), (255, 0, 0, 255));
        assert_eq!(rgba(&surface, 4, 4), (0, 0, 255, 255));
    }

    #[test]
    fn test_missing_source_is_noop() {
        let snap = snapshot(plain_document(20, 10));
        let mut surface = Pixmap::new(40, 30).expect("surface");
        Renderer::new()
            .render(&snap, None, &mut surface, 1.0)
            .expect("noop");
        assert!(surface.data().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_surface_mismatch() {
        let snap = snapshot(plain_document(20, 10));
        let mut surface = Pixmap::new(41, 30).expect("surface");
        let err = Renderer::new()
            .render(&snap, Some(&source(20, 10, [0; 4])), &mut surface, 1.0)
            .unwrap_err();
        assert!(matches!(err, RenderError::SurfaceMismatch { .. }));
    }

    #[test]
    fn test_source_mismatch() {
        let snap = snapshot(plain_document(20, 10));
        let mut surface = Pixmap::new(40, 30).expect("surface");
        let err = Renderer::new()
            .render(&snap, Some(&source(5, 5, [0; 4])), &mut surface, 1.0)
            .unwrap_err();
        assert!(matches!(err, RenderError::InvalidImage(_)));
    }

    #[test]
    fn test_transparent_background_keeps_alpha() {
        let mut document = plain_document(20, 10);
        document.background = Background::Transparent;
        let snap = snapshot(document);
        let mut surface = Pixmap::new(40, 30).expect("surface");
        Renderer::new()
            .render(&snap, Some(&source(20, 10, [255, 0, 0, 255])), &mut surface, 1.0)
            .expect("render");
        assert_eq!(rgba(&surface, 1, 1).3, 0);
        assert_eq!(rgba(&surface, 20, 15).3, 255);
    }

    #[test]
    fn test_browser_frame_covers_title_bar() {
        let mut document = plain_document(100, 50);
        document.frame = FrameKind::Browser;
        document.shadow = Shadow::default();
        document.overlays.push(TextOverlay::new("Hi"));
        let snap = snapshot(document);
        let (w, h) = (snap.canvas().width, snap.canvas().height);
        assert_eq!((w, h), (120, 110));
        let mut surface = Pixmap::new(w, h).expect("surface");
        Renderer::new()
            .render(&snap, Some(&source(100, 50, [255, 0, 0, 255])), &mut surface, 1.0)
            .expect("render");

        // Title bar body between the dots and the address bar.
        assert_eq!(rgba(&surface, 80, 13), (0xf1, 0xf3, 0xf4, 255));
        // Image below the bar.
        assert_eq!(rgba(&surface, 15, 90), (255, 0, 0, 255));
    }

    #[test]
    fn test_rounded_corners_clip_image() {
        let mut document = plain_document(40, 40);
        document.geometry.border_radius = 12.0;
        let snap = snapshot(document);
        let mut surface = Pixmap::new(60, 60).expect("surface");
        Renderer::new()
            .render(&snap, Some(&source(40, 40, [255, 0, 0, 255])), &mut surface, 1.0)
            .expect("render");
        // The image's own corner pixel shows the background.
        assert_eq!(rgba(&surface, 10, 10), (0, 0, 255, 255));
        assert_eq!(rgba(&surface, 30, 30), (255, 0, 0, 255));
    }

    #[test]
    fn test_overlay_with_control_characters_renders() {
        let mut document = plain_document(40, 20);
        document
            .overlays
            .push(TextOverlay::new("Beep\u{8} \u{1b}[1mbold\u{0}").with_font(FontSpec {
                family: "sans-serif".to_string(),
                size: 4.0,
                weight: 400,
            }));
        let snap = snapshot(document);
        let (w, h) = (snap.canvas().width, snap.canvas().height);
        let mut surface = Pixmap::new(w, h).expect("surface");
        Renderer::new()
            .render(&snap, Some(&source(40, 20, [255, 0, 0, 255])), &mut surface, 1.0)
            .expect("control characters are dropped, not fatal");
        assert_eq!(rgba(&surface, 2, 2), (0, 0, 255, 255));
    }
}
