//! SVG layer building and rasterization.
//!
//! Vector layers (backgrounds, shadows, chrome, text) are written as SVG in
//! 1x canvas coordinates and rasterized with resvg at the export scale.

use std::fmt::Write;
use std::sync::{Arc, OnceLock};

use snap_core::{CanvasSize, Color, LinearGradient, Rect};
use tiny_skia::{Pixmap, Transform};
use usvg::fontdb;

use crate::error::{RenderError, RenderResult};

/// System fonts, loaded once per process.
pub(crate) fn font_database() -> Arc<fontdb::Database> {
    static FONTS: OnceLock<Arc<fontdb::Database>> = OnceLock::new();
    FONTS
        .get_or_init(|| {
            let mut db = fontdb::Database::new();
            db.load_system_fonts();
            tracing::debug!(faces = db.len(), "Loaded system fonts");
            Arc::new(db)
        })
        .clone()
}

/// An SVG document under construction.
#[derive(Debug)]
pub(crate) struct SvgLayer {
    defs: String,
    body: String,
    size: CanvasSize,
    next_id: u32,
}

impl SvgLayer {
    pub(crate) fn new(size: CanvasSize) -> Self {
        Self {
            defs: String::new(),
            body: String::with_capacity(4096),
            size,
            next_id: 0,
        }
    }

    pub(crate) fn size(&self) -> CanvasSize {
        self.size
    }

    /// Reserve a unique id for a definition.
    pub(crate) fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}{}", self.next_id)
    }

    pub(crate) fn defs(&mut self) -> &mut String {
        &mut self.defs
    }

    pub(crate) fn body(&mut self) -> &mut String {
        &mut self.body
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Add a `<linearGradient>` definition and return its id.
    ///
    /// With `bounding_box`, coordinates are relative to the painted shape;
    /// otherwise they span the whole canvas.
    pub(crate) fn linear_gradient(&mut self, gradient: &LinearGradient, bounding_box: bool) -> String {
        let id = self.next_id("lg");
        let (w, h, units) = if bounding_box {
            (1.0, 1.0, "objectBoundingBox")
        } else {
            #[allow(clippy::cast_precision_loss)]
            let dims = (self.size.width as f32, self.size.height as f32);
            (dims.0, dims.1, "userSpaceOnUse")
        };
        let ((x1, y1), (x2, y2)) = gradient.endpoints(w, h);
        let _ = write!(
            self.defs,
            "<linearGradient id=\"{id}\" gradientUnits=\"{units}\" x1=\"{x1}\" y1=\"{y1}\" x2=\"{x2}\" y2=\"{y2}\">",
        );
        for stop in &gradient.stops {
            let _ = write!(
                self.defs,
                "<stop offset=\"{}\" stop-color=\"{}\" stop-opacity=\"{}\"/>",
                stop.offset,
                stop.color.to_hex_rgb(),
                stop.color.alpha_f32(),
            );
        }
        self.defs.push_str("</linearGradient>");
        id
    }

    pub(crate) fn finish(self) -> String {
        let CanvasSize { width, height } = self.size;
        let mut svg = String::with_capacity(self.defs.len() + self.body.len() + 256);
        let _ = write!(
            svg,
            "<svg xmlns=\"http://www.w3.org/2000/svg\" xmlns:xlink=\"http://www.w3.org/1999/xlink\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">",
        );
        if !self.defs.is_empty() {
            let _ = write!(svg, "<defs>{}</defs>", self.defs);
        }
        svg.push_str(&self.body);
        svg.push_str("</svg>");
        svg
    }

    /// Rasterize onto `target`, scaling 1x coordinates by `scale`.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Svg`] if the generated document does not parse.
    #[cfg(test)]
    pub(crate) fn draw(self, target: &mut Pixmap, scale: f32) -> RenderResult<()> {
        self.draw_with_fonts(target, scale, font_database())
    }

    /// Rasterize using an explicit font database.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Svg`] if the generated document does not parse.
    pub(crate) fn draw_with_fonts(
        self,
        target: &mut Pixmap,
        scale: f32,
        fonts: Arc<fontdb::Database>,
    ) -> RenderResult<()> {
        if self.is_empty() {
            return Ok(());
        }
        let svg = self.finish();
        let mut opt = usvg::Options::default();
        opt.fontdb = fonts;
        let tree = usvg::Tree::from_str(&svg, &opt).map_err(|e| RenderError::Svg(e.to_string()))?;
        resvg::render(&tree, Transform::from_scale(scale, scale), &mut target.as_mut());
        Ok(())
    }
}

/// `fill` and `fill-opacity` attributes for a color.
pub(crate) fn fill(color: Color) -> String {
    format!(
        "fill=\"{}\" fill-opacity=\"{}\"",
        color.to_hex_rgb(),
        color.alpha_f32()
    )
}

/// Path data for a rectangle with rounded corners.
///
/// The radius is clamped to half the shorter side.
pub(crate) fn rounded_rect_path(rect: Rect, radius: f32) -> String {
    let r = radius.max(0.0).min(rect.width / 2.0).min(rect.height / 2.0);
    let Rect {
        x,
        y,
        width: w,
        height: h,
    } = rect;
    if r <= 0.0 {
        return format!("M{x},{y} h{w} v{h} h{} Z", -w);
    }
    let (right, bottom) = (x + w, y + h);
    format!(
        "M{},{y} H{} A{r},{r} 0 0 1 {right},{} V{} A{r},{r} 0 0 1 {},{bottom} H{} A{r},{r} 0 0 1 {x},{} V{} A{r},{r} 0 0 1 {},{y} Z",
        x + r,
        right - r,
        y + r,
        bottom - r,
        right - r,
        x + r,
        bottom - r,
        y + r,
        x + r,
    )
}

/// Escape special XML characters and drop code points XML 1.0 forbids.
pub(crate) fn escape_xml(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' | '\n' | '\r' => out.push(c),
            '\u{0}'..='\u{1f}' | '\u{fffe}' | '\u{ffff}' => {}
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xml_escaping() {
        assert_eq!(escape_xml("A < B & C > D"), "A &lt; B &amp; C &gt; D");
        assert_eq!(escape_xml("\"'"), "&quot;&apos;");
    }

    #[test]
    fn test_xml_escaping_drops_forbidden_chars() {
        assert_eq!(escape_xml("a\u{8}b\u{0}c\u{1b}"), "abc");
        assert_eq!(escape_xml("x\u{fffe}\u{ffff}y"), "xy");
        assert_eq!(escape_xml("tab\there\r\n"), "tab\there\r\n");
        assert_eq!(escape_xml("caf\u{e9} \u{1f600}"), "caf\u{e9} \u{1f600}");
    }

    #[test]
    fn test_layer_document_shape() {
        let mut layer = SvgLayer::new(CanvasSize {
            width: 800,
            height: 600,
        });
        let id = layer.linear_gradient(
            &LinearGradient::two_stop(90.0, Color::WHITE, Color::BLACK),
            false,
        );
        let _ = write!(layer.body(), "<rect width=\"800\" height=\"600\" fill=\"url(#{id})\"/>");
        let svg = layer.finish();
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains("width=\"800\""));
        assert!(svg.contains("<defs><linearGradient id=\"lg1\""));
        assert!(svg.contains("stop-color=\"#ffffff\""));
    }

    #[test]
    fn test_rounded_rect_radius_is_clamped() {
        let path = rounded_rect_path(Rect::new(0.0, 0.0, 10.0, 4.0), 50.0);
        assert!(path.contains("A2,2"));
        let square = rounded_rect_path(Rect::new(1.0, 2.0, 3.0, 4.0), 0.0);
        assert_eq!(square, "M1,2 h3 v4 h-3 Z");
    }

    #[test]
    fn test_draw_fills_pixels() {
        let mut layer = SvgLayer::new(CanvasSize {
            width: 4,
            height: 4,
        });
        let _ = write!(layer.body(), "<rect width=\"4\" height=\"4\" {}/>", fill(Color::rgb(0, 0, 255)));
        let mut pixmap = Pixmap::new(8, 8).expect("pixmap");
        layer.draw(&mut pixmap, 2.0).expect("draw");
        let px = pixmap.pixel(7, 7).expect("pixel");
        assert_eq!((px.red(), px.green(), px.blue(), px.alpha()), (0, 0, 255, 255));
    }
}
