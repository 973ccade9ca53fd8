//! Frame chrome: window title bars and device bezels.
//!
//! Chrome is drawn after the image. It covers only the frame insets and the
//! screen corners, never the image itself (apart from a phone's notch or
//! camera hole).

use std::fmt::Write;

use snap_core::{FrameKind, Rect};

use crate::svg::{rounded_rect_path, SvgLayer};

const TRAFFIC_LIGHTS: [&str; 3] = ["#ff5f57", "#febc2e", "#28c840"];

/// Corner radii of the card for a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct CardRadii {
    /// Radius of the outer card (frame edge or bare image).
    pub outer: f32,
    /// Radius of the image opening inside the frame.
    pub screen: f32,
}

impl CardRadii {
    pub(crate) fn for_frame(kind: FrameKind, border_radius: f32) -> Self {
        let border_radius = border_radius.max(0.0);
        match kind {
            FrameKind::None => Self {
                outer: border_radius,
                screen: border_radius,
            },
            FrameKind::Browser | FrameKind::MacOs | FrameKind::Windows => Self {
                outer: border_radius,
                screen: 0.0,
            },
            FrameKind::Iphone | FrameKind::Android => {
                #[allow(clippy::cast_precision_loss)]
                let bezel = snap_core::frame::PHONE_BEZEL as f32;
                Self {
                    outer: border_radius.max(24.0) + bezel,
                    screen: border_radius.max(24.0),
                }
            }
        }
    }
}

/// Append chrome for `kind` around `image` inside `frame`.
pub(crate) fn write_chrome(
    layer: &mut SvgLayer,
    kind: FrameKind,
    frame: Rect,
    image: Rect,
    radii: CardRadii,
) {
    let body = match kind {
        FrameKind::None => return,
        FrameKind::Browser => "#f1f3f4",
        FrameKind::MacOs => "#e8e8ea",
        FrameKind::Windows => "#ffffff",
        FrameKind::Iphone => "#1c1c1e",
        FrameKind::Android => "#202124",
    };
    ring(layer, frame, image, radii, body);

    match kind {
        FrameKind::None => {}
        FrameKind::Browser => browser(layer, frame),
        FrameKind::MacOs => macos(layer, frame),
        FrameKind::Windows => windows(layer, frame),
        FrameKind::Iphone => iphone(layer, image),
        FrameKind::Android => android(layer, image),
    }
}

/// The frame body: the rounded card minus the image opening.
fn ring(layer: &mut SvgLayer, frame: Rect, image: Rect, radii: CardRadii, color: &str) {
    let outer = rounded_rect_path(frame, radii.outer);
    let inner = rounded_rect_path(image, radii.screen);
    let _ = write!(
        layer.body(),
        "<path fill-rule=\"evenodd\" d=\"{outer} {inner}\" fill=\"{color}\"/>"
    );
}

fn traffic_lights(body: &mut String, x: f32, cy: f32) {
    for (i, color) in TRAFFIC_LIGHTS.iter().enumerate() {
        #[allow(clippy::cast_precision_loss)]
        let cx = x + i as f32 * 20.0;
        let _ = write!(
            body,
            "<circle cx=\"{cx}\" cy=\"{cy}\" r=\"6\" fill=\"{color}\"/>"
        );
    }
}

#[allow(clippy::cast_precision_loss)]
fn browser(layer: &mut SvgLayer, frame: Rect) {
    let bar = snap_core::frame::BROWSER_BAR_HEIGHT as f32;
    let body = layer.body();
    traffic_lights(body, frame.x + 20.0, frame.y + bar / 2.0);

    let address_x = frame.x + 90.0;
    let address_w = (frame.width - 180.0).max(0.0);
    if address_w > 0.0 {
        let address = Rect::new(address_x, frame.y + 8.0, address_w, bar - 16.0);
        let _ = write!(
            body,
            "<path d=\"{}\" fill=\"#ffffff\" stroke=\"#dadce0\" stroke-width=\"1\"/>",
            rounded_rect_path(address, (bar - 16.0) / 2.0)
        );
    }
}

#[allow(clippy::cast_precision_loss)]
fn macos(layer: &mut SvgLayer, frame: Rect) {
    let bar = snap_core::frame::MACOS_BAR_HEIGHT as f32;
    traffic_lights(layer.body(), frame.x + 18.0, frame.y + bar / 2.0);
}

#[allow(clippy::cast_precision_loss)]
fn windows(layer: &mut SvgLayer, frame: Rect) {
    let bar = snap_core::frame::WINDOWS_BAR_HEIGHT as f32;
    let cy = frame.y + bar / 2.0;
    let right = frame.x + frame.width;
    let body = layer.body();
    let stroke = "stroke=\"#333333\" stroke-width=\"1\" fill=\"none\"";

    // Close, maximize, minimize from the right edge.
    let close = right - 23.0;
    let _ = write!(
        body,
        "<path d=\"M{},{} l10,10 m0,-10 l-10,10\" {stroke}/>",
        close - 5.0,
        cy - 5.0
    );
    let max = right - 69.0;
    let _ = write!(
        body,
        "<rect x=\"{}\" y=\"{}\" width=\"10\" height=\"10\" {stroke}/>",
        max - 5.0,
        cy - 5.0
    );
    let min = right - 115.0;
    let _ = write!(body, "<path d=\"M{},{cy} h10\" {stroke}/>", min - 5.0);
}

fn iphone(layer: &mut SvgLayer, screen: Rect) {
    let width = (screen.width * 0.35).min(180.0);
    let height = 24.0_f32.min(screen.height / 4.0);
    // Top corners sit inside the bezel.
    let notch = Rect::new(
        screen.x + (screen.width - width) / 2.0,
        screen.y - height / 2.0,
        width,
        height * 1.5,
    );
    let _ = write!(
        layer.body(),
        "<path d=\"{}\" fill=\"#1c1c1e\"/>",
        rounded_rect_path(notch, height / 2.0)
    );
}

fn android(layer: &mut SvgLayer, screen: Rect) {
    let r = 6.0_f32.min(screen.width / 8.0);
    let (cx, _) = screen.center();
    let cy = screen.y + 16.0_f32.min(screen.height / 4.0);
    let _ = write!(
        layer.body(),
        "<circle cx=\"{cx}\" cy=\"{cy}\" r=\"{r}\" fill=\"#000000\"/>"
    );
}
