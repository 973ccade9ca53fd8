//! Device and window frames drawn around the image.

use serde::{Deserialize, Serialize};

/// Decorative chrome drawn around the image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameKind {
    /// No frame.
    #[default]
    None,
    /// Generic browser window with tabs and an address bar.
    Browser,
    /// macOS window with traffic-light buttons.
    MacOs,
    /// Windows 11 window with caption buttons.
    Windows,
    /// iPhone bezel with a notch.
    Iphone,
    /// Android bezel with a punch-hole camera.
    Android,
}

/// Space a frame adds around the image, in canvas pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameInsets {
    /// Space above the image.
    pub top: u32,
    /// Space right of the image.
    pub right: u32,
    /// Space below the image.
    pub bottom: u32,
    /// Space left of the image.
    pub left: u32,
}

impl FrameInsets {
    /// Insets of `n` on every side.
    #[must_use]
    pub const fn uniform(n: u32) -> Self {
        Self {
            top: n,
            right: n,
            bottom: n,
            left: n,
        }
    }

    /// Total horizontal inset.
    #[must_use]
    pub const fn horizontal(&self) -> u32 {
        self.left + self.right
    }

    /// Total vertical inset.
    #[must_use]
    pub const fn vertical(&self) -> u32 {
        self.top + self.bottom
    }
}

/// Height of the browser title bar (tabs + address bar).
pub const BROWSER_BAR_HEIGHT: u32 = 40;
/// Height of the macOS title bar.
pub const MACOS_BAR_HEIGHT: u32 = 32;
/// Height of the Windows caption bar.
pub const WINDOWS_BAR_HEIGHT: u32 = 32;
/// Width of a phone bezel.
pub const PHONE_BEZEL: u32 = 16;

impl FrameKind {
    /// All frame kinds, in display order.
    pub const ALL: [Self; 6] = [
        Self::None,
        Self::Browser,
        Self::MacOs,
        Self::Windows,
        Self::Iphone,
        Self::Android,
    ];

    /// The space this frame adds around the image.
    #[must_use]
    pub const fn insets(self) -> FrameInsets {
        match self {
            Self::None => FrameInsets::uniform(0),
            Self::Browser => FrameInsets {
                top: BROWSER_BAR_HEIGHT,
                right: 0,
                bottom: 0,
                left: 0,
            },
            Self::MacOs => FrameInsets {
                top: MACOS_BAR_HEIGHT,
                right: 0,
                bottom: 0,
                left: 0,
            },
            Self::Windows => FrameInsets {
                top: WINDOWS_BAR_HEIGHT,
                right: 0,
                bottom: 0,
                left: 0,
            },
            Self::Iphone | Self::Android => FrameInsets::uniform(PHONE_BEZEL),
        }
    }

    /// Whether the frame is a phone bezel rather than a window.
    #[must_use]
    pub const fn is_device(self) -> bool {
        matches!(self, Self::Iphone | Self::Android)
    }
}
