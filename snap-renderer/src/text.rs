//! Text overlay layer.

use std::fmt::Write;

use snap_core::{TextFill, TextOverlay};

use crate::svg::{escape_xml, fill, SvgLayer};

/// Line height as a multiple of the font size.
pub(crate) const LINE_HEIGHT: f32 = 1.2;

/// Append every overlay, in document order, centered on its position.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn write_overlays(layer: &mut SvgLayer, overlays: &[TextOverlay]) {
    let size = layer.size();
    let (w, h) = (size.width as f32, size.height as f32);

    for overlay in overlays {
        let size = overlay.font.size;
        if overlay.text.trim().is_empty() || !(size.is_finite() && size > 0.0) {
            continue;
        }
        let paint = match &overlay.fill {
            TextFill::Solid { color } => fill(*color),
            // A bounding-box gradient paints only the glyphs.
            TextFill::Gradient { gradient } => {
                let id = layer.linear_gradient(gradient, true);
                format!("fill=\"url(#{id})\"")
            }
        };

        let cx = overlay.x() / 100.0 * w;
        let cy = overlay.y() / 100.0 * h;
        let font = &overlay.font;
        let line_height = font.size * LINE_HEIGHT;
        let lines: Vec<&str> = overlay.text.lines().collect();
        let first_dy = -(lines.len().saturating_sub(1) as f32) * line_height / 2.0;

        let body = layer.body();
        let _ = write!(
            body,
            "<text x=\"{cx}\" y=\"{cy}\" text-anchor=\"middle\" dominant-baseline=\"central\" \
             font-family=\"{}\" font-size=\"{}\" font-weight=\"{}\" {paint}>",
            escape_xml(&font.family),
            font.size,
            font.weight,
        );
        for (i, line) in lines.iter().enumerate() {
            let dy = if i == 0 { first_dy } else { line_height };
            let _ = write!(
                body,
                "<tspan x=\"{cx}\" dy=\"{dy}\">{}</tspan>",
                escape_xml(line)
            );
        }
        body.push_str("</text>");
    }
}
