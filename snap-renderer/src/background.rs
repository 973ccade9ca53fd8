//! Background layer.

use std::f32::consts::TAU;
use std::fmt::Write;

use snap_core::{Background, Color, LinearGradient, MeshPoint};

use crate::svg::{escape_xml, fill, SvgLayer};

/// Spacing between text pattern rows, in font sizes.
const TEXT_ROW_SPACING: f32 = 2.2;
/// Horizontal samples per full wave.
const WAVE_SAMPLES_PER_PERIOD: f32 = 24.0;
/// Stamps beyond this count are not drawn.
const MAX_STAMPS: usize = 4096;

/// Append the background for `background` covering the whole canvas.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn write_background(layer: &mut SvgLayer, background: &Background) {
    let size = layer.size();
    let (w, h) = (size.width as f32, size.height as f32);

    match background {
        Background::Solid { color } => fill_canvas(layer, &fill(*color)),
        Background::Gradient { gradient } => fill_gradient(layer, gradient),
        Background::Mesh { base, points } => {
            fill_gradient(layer, base);
            for point in points {
                mesh_blob(layer, point, w, h);
            }
        }
        Background::TextPattern {
            text,
            background,
            color,
            font_size,
            angle_deg,
        } => {
            fill_canvas(layer, &fill(*background));
            text_pattern(layer, text, *color, *font_size, *angle_deg, w, h);
        }
        Background::WaveSplit {
            top,
            bottom,
            split,
            amplitude,
            frequency,
        } => {
            fill_canvas(layer, &fill(*top));
            wave(layer, *bottom, *split, *amplitude, *frequency, w, h);
        }
        Background::LogoPattern {
            background,
            color,
            size,
            spacing,
        } => {
            fill_canvas(layer, &fill(*background));
            logo_stamps(layer, *color, *size, *spacing, w, h);
        }
        Background::Transparent => {}
    }
}

fn fill_canvas(layer: &mut SvgLayer, paint: &str) {
    let size = layer.size();
    let _ = write!(
        layer.body(),
        "<rect width=\"{}\" height=\"{}\" {paint}/>",
        size.width,
        size.height
    );
}

fn fill_gradient(layer: &mut SvgLayer, gradient: &LinearGradient) {
    let id = layer.linear_gradient(gradient, false);
    fill_canvas(layer, &format!("fill=\"url(#{id})\""));
}

fn mesh_blob(layer: &mut SvgLayer, point: &MeshPoint, w: f32, h: f32) {
    let id = layer.next_id("mesh");
    let cx = point.x.clamp(0.0, 100.0) / 100.0 * w;
    let cy = point.y.clamp(0.0, 100.0) / 100.0 * h;
    let r = w.max(h) * 0.6;
    let hex = point.color.to_hex_rgb();
    let _ = write!(
        layer.defs(),
        "<radialGradient id=\"{id}\" gradientUnits=\"userSpaceOnUse\" cx=\"{cx}\" cy=\"{cy}\" r=\"{r}\">\
         <stop offset=\"0\" stop-color=\"{hex}\" stop-opacity=\"{}\"/>\
         <stop offset=\"1\" stop-color=\"{hex}\" stop-opacity=\"0\"/>\
         </radialGradient>",
        point.color.alpha_f32(),
    );
    fill_canvas(layer, &format!("fill=\"url(#{id})\""));
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn text_pattern(
    layer: &mut SvgLayer,
    text: &str,
    color: Color,
    font_size: f32,
    angle_deg: f32,
    w: f32,
    h: f32,
) {
    let text = text.trim();
    if text.is_empty() || font_size <= 0.0 {
        return;
    }
    // Rows span the diagonal so rotation never exposes an empty corner.
    let diag = w.hypot(h);
    let (cx, cy) = (w / 2.0, h / 2.0);
    let approx_word = (text.chars().count() as f32 + 2.0) * font_size * 0.6;
    let repeats = ((diag / approx_word).ceil() as usize + 1).min(256);
    let row = vec![escape_xml(text); repeats].join("\u{a0}\u{a0}");
    let row_height = font_size * TEXT_ROW_SPACING;
    let rows = ((diag / row_height).ceil() as usize + 1).min(512);

    let paint = fill(color);
    let body = layer.body();
    let _ = write!(
        body,
        "<g transform=\"rotate({angle_deg} {cx} {cy})\" font-family=\"sans-serif\" font-weight=\"700\" font-size=\"{font_size}\" {paint}>",
    );
    for i in 0..rows {
        let y = cy - diag / 2.0 + i as f32 * row_height;
        // Stagger alternate rows by half a word.
        let x = cx - diag / 2.0 - if i % 2 == 0 { 0.0 } else { approx_word / 2.0 };
        let _ = write!(body, "<text x=\"{x}\" y=\"{y}\">{row}</text>");
    }
    body.push_str("</g>");
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn wave(
    layer: &mut SvgLayer,
    bottom: Color,
    split: f32,
    amplitude: f32,
    frequency: f32,
    w: f32,
    h: f32,
) {
    let base = split.clamp(0.0, 1.0) * h;
    let amp = amplitude.clamp(0.0, 1.0) * h;
    let frequency = frequency.max(0.0);
    let samples = ((frequency * WAVE_SAMPLES_PER_PERIOD).ceil() as usize).clamp(2, 2048);

    let mut d = String::with_capacity(samples * 16);
    for i in 0..=samples {
        let x = w * i as f32 / samples as f32;
        let y = base + (TAU * frequency * x / w.max(1.0)).sin() * amp;
        let _ = write!(d, "{}{x},{y} ", if i == 0 { 'M' } else { 'L' });
    }
    let _ = write!(d, "L{w},{h} L0,{h} Z");
    let paint = fill(bottom);
    let _ = write!(layer.body(), "<path d=\"{d}\" {paint}/>");
}

/// A rounded square with a lens circle, drawn in a grid.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn logo_stamps(layer: &mut SvgLayer, color: Color, size: f32, spacing: f32, w: f32, h: f32) {
    if size <= 0.0 {
        return;
    }
    let step = (size + spacing.max(0.0)).max(4.0);
    let cols = (w / step).ceil() as usize + 1;
    let rows = (h / step).ceil() as usize + 1;
    if cols.saturating_mul(rows) > MAX_STAMPS {
        tracing::debug!(cols, rows, "Logo pattern too dense, truncating");
    }

    let id = layer.next_id("logo");
    let radius = size * 0.22;
    let lens = size * 0.22;
    let half = size / 2.0;
    let paint = fill(color);
    let _ = write!(
        layer.defs(),
        "<g id=\"{id}\"><rect width=\"{size}\" height=\"{size}\" rx=\"{radius}\" {paint}/>\
         <circle cx=\"{half}\" cy=\"{half}\" r=\"{lens}\" fill=\"none\" stroke=\"#ffffff\" stroke-opacity=\"0.6\" stroke-width=\"{}\"/></g>",
        size * 0.08,
    );

    let offset = spacing.max(0.0) / 2.0;
    let body = layer.body();
    for (n, (row, col)) in (0..rows)
        .flat_map(|r| (0..cols).map(move |c| (r, c)))
        .enumerate()
    {
        if n >= MAX_STAMPS {
            break;
        }
        let x = offset + col as f32 * step;
        let y = offset + row as f32 * step;
        let _ = write!(body, "<use xlink:href=\"#{id}\" x=\"{x}\" y=\"{y}\"/>");
    }
}
