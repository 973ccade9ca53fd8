//! Upload validation.
//!
//! Files MUST pass [`validate_upload`] before they are decoded.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{ErrorKind, HasErrorKind};

/// Largest accepted upload (50 MiB).
pub const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// Accepted image subtypes, compared without the `image/` prefix.
pub const ALLOWED_IMAGE_TYPES: [&str; 5] = ["png", "jpeg", "jpg", "webp", "gif"];

/// What is known about a file before reading it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadInfo {
    /// Declared MIME type, e.g. `image/png`.
    pub mime_type: String,
    /// Size in bytes.
    pub size_bytes: u64,
}

impl UploadInfo {
    /// Create upload metadata.
    #[must_use]
    pub fn new(mime_type: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            mime_type: mime_type.into(),
            size_bytes,
        }
    }
}

/// Upload validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    /// The MIME type is not an accepted image type.
    #[error("unsupported file type '{0}' (expected PNG, JPEG, WebP or GIF)")]
    InvalidFileType(String),
    /// The file exceeds [`MAX_UPLOAD_BYTES`].
    #[error("file too large ({size} bytes, max {MAX_UPLOAD_BYTES})")]
    FileTooLarge {
        /// Actual size.
        size: u64,
    },
}

impl UploadError {
    /// Stable machine-readable code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidFileType(_) => "INVALID_FILE_TYPE",
            Self::FileTooLarge { .. } => "FILE_TOO_LARGE",
        }
    }
}

impl HasErrorKind for UploadError {
    fn error_kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}

fn is_allowed_type(mime: &str) -> bool {
    let mime = mime.trim().to_ascii_lowercase();
    let subtype = mime.strip_prefix("image/").unwrap_or(&mime);
    ALLOWED_IMAGE_TYPES.contains(&subtype)
}

/// Every rule `info` breaks, type before size.
#[must_use]
pub fn violations(info: &UploadInfo) -> Vec<UploadError> {
    let mut found = Vec::new();
    if !is_allowed_type(&info.mime_type) {
        found.push(UploadError::InvalidFileType(info.mime_type.clone()));
    }
    if info.size_bytes > MAX_UPLOAD_BYTES {
        found.push(UploadError::FileTooLarge {
            size: info.size_bytes,
        });
    }
    found
}

/// Validate an upload.
///
/// # Errors
///
/// Returns the first entry of [`violations`] if any.
pub fn validate_upload(info: &UploadInfo) -> Result<(), UploadError> {
    match violations(info).into_iter().next() {
        Some(error) => Err(error),
        None => Ok(()),
    }
}
