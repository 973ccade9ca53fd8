//! Error types and the user-facing error taxonomy.
//!
//! Errors are tagged with an [`ErrorKind`] where they are raised. The kind
//! decides whether an operation may be retried and which [`FriendlyError`]
//! is shown to the user.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::overlay::OverlayId;

/// Result type for editor operations.
pub type EditorResult<T> = Result<T, EditorError>;

/// Errors raised while applying an action to the editor document.
#[derive(Debug, Error)]
pub enum EditorError {
    /// Text overlay not found in the document.
    #[error("Text overlay not found: {0}")]
    OverlayNotFound(OverlayId),

    /// An overlay with this ID already exists.
    #[error("Duplicate text overlay: {0}")]
    DuplicateOverlay(OverlayId),

    /// A crop action arrived while the editor is not cropping.
    #[error("Not in crop mode")]
    NotCropping,

    /// The action needs an image but none is loaded.
    #[error("No image loaded")]
    NoImage,

    /// A parameter was outside its allowed range.
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Document serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse error category used for retry decisions and user messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Network request failed or timed out.
    Network,
    /// Access to a resource (clipboard, file system) was denied.
    Permission,
    /// A local file could not be read.
    FileRead,
    /// An image could not be fetched or decoded.
    ImageLoad,
    /// Drawing onto a surface failed.
    CanvasRender,
    /// Encoding or delivering an export failed.
    Export,
    /// The operation ran out of memory or storage quota.
    Memory,
    /// Input was rejected before any work was done.
    Validation,
    /// Anything not covered above.
    Unknown,
}

/// Implemented by errors that know their own [`ErrorKind`].
pub trait HasErrorKind {
    /// The category of this error.
    fn error_kind(&self) -> ErrorKind;
}

impl HasErrorKind for EditorError {
    fn error_kind(&self) -> ErrorKind {
        match self {
            Self::Serialization(_) => ErrorKind::Unknown,
            Self::OverlayNotFound(_)
            | Self::DuplicateOverlay(_)
            | Self::NotCropping
            | Self::NoImage
            | Self::InvalidValue(_) => ErrorKind::Validation,
        }
    }
}

impl ErrorKind {
    /// Infer a kind from a free-form error message.
    ///
    /// Only meant for errors coming from code that does not tag its own
    /// failures. Matching is case-insensitive and the first rule that hits
    /// wins.
    #[must_use]
    pub fn classify(message: &str) -> Self {
        const RULES: &[(&[&str], ErrorKind)] = &[
            (&["memory", "quota", "allocation"], ErrorKind::Memory),
            (&["timeout", "timed out"], ErrorKind::ImageLoad),
            (&["permission", "denied", "not allowed"], ErrorKind::Permission),
            (&["network", "fetch", "connection", "offline"], ErrorKind::Network),
            (&["invalid", "unsupported", "too large"], ErrorKind::Validation),
            (&["read file", "file read", "filereader"], ErrorKind::FileRead),
            (&["image", "decode"], ErrorKind::ImageLoad),
            (&["canvas", "render", "tainted"], ErrorKind::CanvasRender),
            (&["export", "encode", "blob", "clipboard"], ErrorKind::Export),
        ];

        let lower = message.to_lowercase();
        RULES
            .iter()
            .find(|(needles, _)| needles.iter().any(|n| lower.contains(n)))
            .map_or(Self::Unknown, |(_, kind)| *kind)
    }

    /// Whether an operation failing with this kind is worth retrying.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        !matches!(self, Self::Validation | Self::Permission | Self::FileRead)
    }

    /// The user-facing description for this kind.
    #[must_use]
    pub const fn friendly(self) -> FriendlyError {
        match self {
            Self::Network => FriendlyError {
                title: "Connection problem",
                message: "We couldn't reach the network.",
                action: "Check your internet connection and try again.",
            },
            Self::Permission => FriendlyError {
                title: "Permission needed",
                message: "The browser blocked this action.",
                action: "Allow access in your browser settings and try again.",
            },
            Self::FileRead => FriendlyError {
                title: "Couldn't read file",
                message: "The selected file could not be opened.",
                action: "Try selecting the file again or pick a different one.",
            },
            Self::ImageLoad => FriendlyError {
                title: "Image failed to load",
                message: "The image could not be loaded or decoded.",
                action: "Try a different image or re-upload this one.",
            },
            Self::CanvasRender => FriendlyError {
                title: "Rendering failed",
                message: "Something went wrong while drawing your image.",
                action: "Reload the editor and try again.",
            },
            Self::Export => FriendlyError {
                title: "Export failed",
                message: "Your image could not be exported.",
                action: "Try a different format or a smaller scale.",
            },
            Self::Memory => FriendlyError {
                title: "Not enough memory",
                message: "The image is too large to process at this size.",
                action: "Use a lower export scale or a smaller image.",
            },
            Self::Validation => FriendlyError {
                title: "Invalid input",
                message: "That file or value isn't supported.",
                action: "Use a PNG, JPEG, WebP or GIF image under 50MB.",
            },
            Self::Unknown => FriendlyError {
                title: "Something went wrong",
                message: "An unexpected error occurred.",
                action: "Try again. If the problem continues, reload the page.",
            },
        }
    }
}

/// A title, message and suggested action shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FriendlyError {
    /// Short heading.
    pub title: &'static str,
    /// What happened.
    pub message: &'static str,
    /// What the user can do about it.
    pub action: &'static str,
}

/// Look up the friendly description for any tagged error.
#[must_use]
pub fn friendly_error<E: HasErrorKind>(error: &E) -> FriendlyError {
    error.error_kind().friendly()
}
