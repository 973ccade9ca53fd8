//! Renderer, export and delivery error types.

use snap_core::{ErrorKind, ExportFormat, ExportScale, HasErrorKind};
use thiserror::Error;

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// Errors that can occur while decoding or drawing.
#[derive(Debug, Error)]
pub enum RenderError {
    /// A surface of the requested size could not be allocated.
    #[error("Failed to allocate {width}x{height} surface")]
    Allocation {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },

    /// The request exceeds the configured pixel budget.
    #[error("Surface of {pixels} pixels exceeds limit of {limit}")]
    PixelLimit {
        /// Requested pixel count.
        pixels: u64,
        /// Configured maximum.
        limit: u64,
    },

    /// The provided surface does not match the snapshot's dimensions.
    #[error("Surface is {actual_width}x{actual_height}, expected {expected_width}x{expected_height}")]
    SurfaceMismatch {
        /// Expected width.
        expected_width: u32,
        /// Expected height.
        expected_height: u32,
        /// Actual width.
        actual_width: u32,
        /// Actual height.
        actual_height: u32,
    },

    /// A generated SVG layer failed to parse.
    #[error("SVG layer failed: {0}")]
    Svg(String),

    /// The source image could not be decoded.
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// The source image is not usable.
    #[error("Invalid image: {0}")]
    InvalidImage(String),
}

impl HasErrorKind for RenderError {
    fn error_kind(&self) -> ErrorKind {
        match self {
            Self::Allocation { .. } | Self::PixelLimit { .. } => ErrorKind::Memory,
            Self::SurfaceMismatch { .. } | Self::Svg(_) => ErrorKind::CanvasRender,
            Self::Decode(_) | Self::InvalidImage(_) => ErrorKind::ImageLoad,
        }
    }
}

/// Errors raised by delivery adapters.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The user dismissed the share sheet or save dialog.
    #[error("Cancelled by user")]
    Cancelled,

    /// The platform refused access.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Writing the output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other adapter failure.
    #[error("Delivery failed: {0}")]
    Failed(String),
}

impl HasErrorKind for DeliveryError {
    fn error_kind(&self) -> ErrorKind {
        match self {
            Self::Cancelled => ErrorKind::Unknown,
            Self::PermissionDenied(_) => ErrorKind::Permission,
            Self::Io(_) => ErrorKind::FileRead,
            Self::Failed(message) => match ErrorKind::classify(message) {
                ErrorKind::Unknown => ErrorKind::Export,
                kind => kind,
            },
        }
    }
}

/// Errors returned by the export pipeline.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Another export is in flight.
    #[error("An export is already in progress")]
    Busy,

    /// Nothing to export.
    #[error("No image loaded")]
    NoImage,

    /// The requested action has no adapter on this platform.
    #[error("{0} is not supported on this platform")]
    Unsupported(&'static str),

    /// The format is not available on the user's plan.
    #[error("{format} export requires a Pro plan")]
    FormatNotAllowed {
        /// Requested format.
        format: ExportFormat,
    },

    /// The scale is not available on the user's plan.
    #[error("{requested} export exceeds plan maximum of {max}")]
    ScaleNotAllowed {
        /// Requested scale.
        requested: ExportScale,
        /// Highest allowed scale.
        max: ExportScale,
    },

    /// Rendering failed at every scale down to 1x.
    #[error("Render failed: {0}")]
    Render(#[from] RenderError),

    /// Encoding failed.
    #[error("Encoding {format} failed: {message}")]
    Encode {
        /// Target format.
        format: ExportFormat,
        /// Encoder message.
        message: String,
    },

    /// Delivery failed.
    #[error("Delivery failed: {0}")]
    Delivery(#[from] DeliveryError),

    /// The background render task panicked or was aborted.
    #[error("Export task failed: {0}")]
    Task(String),
}

impl HasErrorKind for ExportError {
    fn error_kind(&self) -> ErrorKind {
        match self {
            Self::Busy | Self::NoImage | Self::FormatNotAllowed { .. } | Self::ScaleNotAllowed { .. } => {
                ErrorKind::Validation
            }
            Self::Unsupported(_) => ErrorKind::Permission,
            Self::Render(e) => e.error_kind(),
            Self::Delivery(e) => e.error_kind(),
            Self::Encode { .. } | Self::Task(_) => ErrorKind::Export,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_is_memory() {
        let err = RenderError::Allocation {
            width: 1,
            height: 1,
        };
        assert_eq!(err.error_kind(), ErrorKind::Memory);
        assert!(err.error_kind().is_retryable());
    }

    #[test]
    fn test_export_error_kinds() {
        assert_eq!(ExportError::Busy.error_kind(), ErrorKind::Validation);
        assert_eq!(
            ExportError::Unsupported("Share").error_kind(),
            ErrorKind::Permission
        );
        assert_eq!(
            ExportError::from(DeliveryError::Failed("clipboard write blocked".into())).error_kind(),
            ErrorKind::Export
        );
        assert_eq!(
            ExportError::from(DeliveryError::Failed("network offline".into())).error_kind(),
            ErrorKind::Network
        );
    }
}
