//! Delivery adapters for encoded exports.
//!
//! An export ends by handing its bytes to one adapter, chosen by the
//! requested [`ExportAction`] and what the platform offers:
//!
//! | Action   | First choice   | Fallback          |
//! |----------|----------------|-------------------|
//! | download | native bridge  | file download     |
//! | share    | native bridge  | share target      |
//! | copy     | clipboard      | none              |

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use snap_core::{ExportFormat, ExportScale};

use crate::error::{DeliveryError, ExportError};

/// Prefix of every exported file name.
pub const FILE_PREFIX: &str = "snapbeautify-";

/// What the user asked to do with the export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportAction {
    /// Save a file.
    #[default]
    Download,
    /// Put the image on the clipboard.
    Copy,
    /// Hand the image to a share sheet.
    Share,
}

impl ExportAction {
    /// Human-readable name.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Download => "Download",
            Self::Copy => "Copy",
            Self::Share => "Share",
        }
    }
}

/// Which adapter delivered an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryRoute {
    /// Host application bridge.
    NativeBridge,
    /// System clipboard.
    Clipboard,
    /// Share target.
    Share,
    /// File written to disk.
    Download,
}

/// An encoded export ready for delivery.
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    /// Encoded bytes.
    pub bytes: Vec<u8>,
    /// Encoding.
    pub format: ExportFormat,
    /// Scale actually rendered.
    pub scale: ExportScale,
    /// Pixel width.
    pub width: u32,
    /// Pixel height.
    pub height: u32,
}

impl ExportArtifact {
    /// Suggested file name, e.g. `snapbeautify-1700000000000@2x.png`.
    #[must_use]
    pub fn file_name(&self) -> String {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_millis());
        format!(
            "{FILE_PREFIX}{millis}@{}.{}",
            self.scale,
            self.format.extension()
        )
    }
}

/// Where a delivered export ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    /// Adapter used.
    pub route: DeliveryRoute,
    /// Path or identifier, when the adapter has one.
    pub location: Option<String>,
}

/// Something that can take an encoded export.
#[async_trait]
pub trait DeliveryAdapter: Send + Sync {
    /// Deliver `artifact` for `action`.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::Cancelled`] if the user declined, or another
    /// [`DeliveryError`] if delivery failed.
    async fn deliver(
        &self,
        action: ExportAction,
        artifact: &ExportArtifact,
    ) -> Result<DeliveryReceipt, DeliveryError>;
}

/// The adapters available on this platform.
#[derive(Clone, Default)]
pub struct Platform {
    /// Host bridge, preferred for download and share.
    pub native_bridge: Option<Arc<dyn DeliveryAdapter>>,
    /// Clipboard writer.
    pub clipboard: Option<Arc<dyn DeliveryAdapter>>,
    /// Share target.
    pub share: Option<Arc<dyn DeliveryAdapter>>,
    /// File download.
    pub download: Option<Arc<dyn DeliveryAdapter>>,
}

impl std::fmt::Debug for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Platform")
            .field("capabilities", &self.capabilities())
            .finish()
    }
}

impl Platform {
    /// A platform that can only write files into `dir`.
    #[must_use]
    pub fn downloads_only(dir: impl Into<PathBuf>) -> Self {
        Self::with_download(FileDownload::new(dir))
    }

    /// A platform whose only adapter is `download`.
    #[must_use]
    pub fn with_download(download: FileDownload) -> Self {
        Self {
            download: Some(Arc::new(download)),
            ..Self::default()
        }
    }

    /// Detect which adapters exist.
    #[must_use]
    pub fn capabilities(&self) -> PlatformCapabilities {
        PlatformCapabilities {
            native_bridge: self.native_bridge.is_some(),
            clipboard: self.clipboard.is_some(),
            share: self.share.is_some(),
            download: self.download.is_some(),
        }
    }

    /// Pick the adapter for `action`.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Unsupported`] if no adapter handles `action`.
    pub fn route(
        &self,
        action: ExportAction,
    ) -> Result<(DeliveryRoute, Arc<dyn DeliveryAdapter>), ExportError> {
        let native = || {
            self.native_bridge
                .clone()
                .map(|a| (DeliveryRoute::NativeBridge, a))
        };
        let chosen = match action {
            ExportAction::Download => native().or_else(|| {
                self.download
                    .clone()
                    .map(|a| (DeliveryRoute::Download, a))
            }),
            ExportAction::Share => {
                native().or_else(|| self.share.clone().map(|a| (DeliveryRoute::Share, a)))
            }
            ExportAction::Copy => self
                .clipboard
                .clone()
                .map(|a| (DeliveryRoute::Clipboard, a)),
        };
        chosen.ok_or(ExportError::Unsupported(action.label()))
    }
}

/// Snapshot of which adapters exist, taken once per pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformCapabilities {
    /// Native bridge present.
    pub native_bridge: bool,
    /// Clipboard present.
    pub clipboard: bool,
    /// Share target present.
    pub share: bool,
    /// File download present.
    pub download: bool,
}

impl PlatformCapabilities {
    /// Whether `action` can be delivered at all.
    #[must_use]
    pub const fn supports(self, action: ExportAction) -> bool {
        match action {
            ExportAction::Download => self.native_bridge || self.download,
            ExportAction::Share => self.native_bridge || self.share,
            ExportAction::Copy => self.clipboard,
        }
    }
}

/// Writes exports into a directory.
#[derive(Debug, Clone)]
pub struct FileDownload {
    dir: PathBuf,
    keep: Option<usize>,
}

impl FileDownload {
    /// Create an adapter writing into `dir`. The directory is created on
    /// first use. Files are kept forever.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            keep: None,
        }
    }

    /// Keep at most `keep` exports (at least one); older ones are deleted
    /// after each write.
    #[must_use]
    pub fn with_retention(mut self, keep: usize) -> Self {
        self.keep = Some(keep.max(1));
        self
    }

    /// Target directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Delete the oldest exports beyond `keep`. Returns how many went.
    ///
    /// Only files carrying [`FILE_PREFIX`] are touched.
    async fn prune(&self, keep: usize) -> std::io::Result<usize> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut exports = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_name().to_string_lossy().starts_with(FILE_PREFIX) {
                continue;
            }
            let meta = entry.metadata().await?;
            if meta.is_file() {
                exports.push((meta.modified().unwrap_or(UNIX_EPOCH), entry.path()));
            }
        }
        if exports.len() <= keep {
            return Ok(0);
        }

        // Ties on mtime fall back to the name, which embeds the write time.
        exports.sort();
        let excess = exports.len() - keep;
        for (_, path) in exports.drain(..excess) {
            tokio::fs::remove_file(&path).await?;
        }
        Ok(excess)
    }
}

#[async_trait]
impl DeliveryAdapter for FileDownload {
    async fn deliver(
        &self,
        _action: ExportAction,
        artifact: &ExportArtifact,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(artifact.file_name());
        tokio::fs::write(&path, &artifact.bytes).await?;
        tracing::info!(path = %path.display(), bytes = artifact.bytes.len(), "Export written");
        if let Some(keep) = self.keep {
            match self.prune(keep).await {
                Ok(0) => {}
                Ok(removed) => tracing::debug!(removed, keep, "Pruned old exports"),
                Err(e) => tracing::warn!(error = %e, "Failed to prune old exports"),
            }
        }
        Ok(DeliveryReceipt {
            route: DeliveryRoute::Download,
            location: Some(path.display().to_string()),
        })
    }
}
