//! Export pipeline.
//!
//! Renders a snapshot at the requested scale into a pooled surface, encodes
//! it to PNG, JPEG or WebP, and hands the bytes to a delivery adapter.
//!
//! ```text
//! Idle → Rendering → Encoding → Delivering → Success
//!          │            │            │
//!          └─ fails ────┘            └─ fails ──→ Failed
//!          retry at scale-1 until 1x, then Failed
//! ```
//!
//! A user cancellation during delivery ends the attempt without trying a
//! smaller scale.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use image::ImageEncoder;
use serde::{Deserialize, Serialize};
use snap_core::{ExportFormat, ExportScale, ExportSettings, RenderSnapshot};
use tiny_skia::Pixmap;
use tokio::sync::watch;

use crate::delivery::{
    DeliveryReceipt, ExportAction, ExportArtifact, Platform, PlatformCapabilities,
};
use crate::error::{DeliveryError, ExportError, RenderError, RenderResult};
use crate::image::SourceImage;
use crate::pool::{CanvasPool, PoolConfig, PoolStats};
use crate::renderer::Renderer;

/// Limits applied before allocating an export surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportLimits {
    /// Largest surface, in pixels, the pipeline will try to allocate.
    pub max_pixels: u64,
}

impl Default for ExportLimits {
    fn default() -> Self {
        Self {
            max_pixels: 100_000_000,
        }
    }
}

/// Subscription tier, gating formats and scales.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// PNG up to 2x.
    #[default]
    Free,
    /// Every format up to 4x.
    Pro,
}

impl Tier {
    /// Highest scale this tier may export.
    #[must_use]
    pub const fn max_scale(self) -> ExportScale {
        match self {
            Self::Free => ExportScale::X2,
            Self::Pro => ExportScale::X4,
        }
    }

    /// Whether this tier may export `format`.
    #[must_use]
    pub const fn allows_format(self, format: ExportFormat) -> bool {
        match self {
            Self::Free => matches!(format, ExportFormat::Png),
            Self::Pro => true,
        }
    }

    /// Check a format and scale against this tier.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::FormatNotAllowed`] or
    /// [`ExportError::ScaleNotAllowed`].
    pub fn check(self, format: ExportFormat, scale: ExportScale) -> Result<(), ExportError> {
        if !self.allows_format(format) {
            return Err(ExportError::FormatNotAllowed { format });
        }
        if scale > self.max_scale() {
            return Err(ExportError::ScaleNotAllowed {
                requested: scale,
                max: self.max_scale(),
            });
        }
        Ok(())
    }
}

/// Where an export attempt currently is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportPhase {
    /// Nothing running.
    #[default]
    Idle,
    /// Drawing into the export surface.
    Rendering,
    /// Encoding pixels.
    Encoding,
    /// Handing bytes to an adapter.
    Delivering,
    /// Delivered.
    Success,
    /// Gave up.
    Failed,
}

/// One export request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRequest {
    /// What to do with the result.
    pub action: ExportAction,
    /// Output format.
    pub format: ExportFormat,
    /// Requested scale; lower scales may be used on failure.
    pub scale: ExportScale,
    /// JPEG quality 1-100.
    pub jpeg_quality: u8,
    /// Caller's plan.
    pub tier: Tier,
}

impl ExportRequest {
    /// Build a request from the document's export settings.
    #[must_use]
    pub fn from_settings(settings: ExportSettings, action: ExportAction, tier: Tier) -> Self {
        Self {
            action,
            format: settings.format,
            scale: settings.scale,
            jpeg_quality: settings.jpeg_quality,
            tier,
        }
    }
}

/// A completed export.
#[derive(Debug, Clone)]
pub struct ExportReport {
    /// The encoded output.
    pub artifact: ExportArtifact,
    /// Where it went.
    pub receipt: DeliveryReceipt,
    /// Scale originally requested.
    pub requested_scale: ExportScale,
}

impl ExportReport {
    /// Whether a lower scale than requested was used.
    #[must_use]
    pub fn downgraded(&self) -> bool {
        self.artifact.scale < self.requested_scale
    }
}

/// How an export ended, when it did not fail.
#[derive(Debug, Clone)]
pub enum ExportOutcome {
    /// Delivered.
    Delivered(ExportReport),
    /// The user declined during delivery.
    Cancelled {
        /// Scale of the declined attempt.
        scale: ExportScale,
    },
}

/// Render `snapshot` at `scale` into a surface taken from `pool`.
///
/// The surface measures exactly `canvas * scale`. On failure the surface is
/// returned to the pool.
///
/// # Errors
///
/// Returns [`RenderError::PixelLimit`] if the surface would exceed
/// `limits`, [`RenderError::Allocation`] if it cannot be allocated, or any
/// render error.
pub fn create_export_canvas(
    renderer: &Renderer,
    snapshot: &RenderSnapshot,
    source: &SourceImage,
    scale: ExportScale,
    pool: &mut CanvasPool,
    limits: ExportLimits,
) -> RenderResult<Pixmap> {
    let size = snapshot.canvas().scaled(scale);
    if size.pixels() > limits.max_pixels {
        return Err(RenderError::PixelLimit {
            pixels: size.pixels(),
            limit: limits.max_pixels,
        });
    }
    let mut surface = pool.acquire(size.width, size.height)?;
    match renderer.render(snapshot, Some(source), &mut surface, f32::from(scale.get())) {
        Ok(()) => Ok(surface),
        Err(e) => {
            pool.release(surface);
            Err(e)
        }
    }
}

/// Encode a rendered surface.
///
/// JPEG has no alpha channel, so transparent pixels are flattened over
/// white. WebP is lossless.
///
/// # Errors
///
/// Returns [`ExportError::Encode`] if the encoder fails.
pub fn encode(pixmap: &Pixmap, format: ExportFormat, jpeg_quality: u8) -> Result<Vec<u8>, ExportError> {
    let encode_err = |message: String| ExportError::Encode { format, message };
    let (width, height) = (pixmap.width(), pixmap.height());

    match format {
        ExportFormat::Png => pixmap.encode_png().map_err(|e| encode_err(e.to_string())),
        ExportFormat::Jpeg => {
            let mut rgb = Vec::with_capacity(pixmap.pixels().len() * 3);
            for px in pixmap.pixels() {
                // Premultiplied source over opaque white.
                let cover = 255 - px.alpha();
                rgb.extend_from_slice(&[
                    px.red().saturating_add(cover),
                    px.green().saturating_add(cover),
                    px.blue().saturating_add(cover),
                ]);
            }
            let mut buf = std::io::Cursor::new(Vec::new());
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, jpeg_quality.clamp(1, 100))
                .write_image(&rgb, width, height, image::ExtendedColorType::Rgb8)
                .map_err(|e| encode_err(e.to_string()))?;
            Ok(buf.into_inner())
        }
        ExportFormat::Webp => {
            let mut rgba = Vec::with_capacity(pixmap.data().len());
            for px in pixmap.pixels() {
                let c = px.demultiply();
                rgba.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
            }
            let mut buf = std::io::Cursor::new(Vec::new());
            image::codecs::webp::WebPEncoder::new_lossless(&mut buf)
                .write_image(&rgba, width, height, image::ExtendedColorType::Rgba8)
                .map_err(|e| encode_err(e.to_string()))?;
            Ok(buf.into_inner())
        }
    }
}

/// Clears the in-flight flag when an export ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs exports one at a time.
#[derive(Debug)]
pub struct ExportPipeline {
    renderer: Renderer,
    pool: Arc<Mutex<CanvasPool>>,
    limits: ExportLimits,
    platform: Platform,
    capabilities: PlatformCapabilities,
    phase: Arc<watch::Sender<ExportPhase>>,
    in_flight: AtomicBool,
}

impl ExportPipeline {
    /// Create a pipeline. Platform capabilities are detected here, once.
    #[must_use]
    pub fn new(renderer: Renderer, platform: Platform) -> Self {
        let capabilities = platform.capabilities();
        tracing::info!(?capabilities, "Export pipeline ready");
        Self {
            renderer,
            pool: Arc::new(Mutex::new(CanvasPool::new())),
            limits: ExportLimits::default(),
            platform,
            capabilities,
            phase: Arc::new(watch::channel(ExportPhase::Idle).0),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Set the surface limits.
    #[must_use]
    pub fn with_limits(mut self, limits: ExportLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Replace the canvas pool configuration.
    #[must_use]
    pub fn with_pool_config(mut self, config: PoolConfig) -> Self {
        self.pool = Arc::new(Mutex::new(CanvasPool::with_config(config)));
        self
    }

    /// Capabilities detected at construction.
    #[must_use]
    pub fn capabilities(&self) -> PlatformCapabilities {
        self.capabilities
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> ExportPhase {
        *self.phase.borrow()
    }

    /// Watch phase transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ExportPhase> {
        self.phase.subscribe()
    }

    /// Whether an export is running.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Canvas pool statistics.
    #[must_use]
    pub fn pool_stats(&self) -> PoolStats {
        self.pool
            .lock()
            .map(|pool| pool.stats().clone())
            .unwrap_or_default()
    }

    /// Export `snapshot`.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Busy`] while another export runs,
    /// an entitlement or [`ExportError::Unsupported`] error before any
    /// rendering, or the last failure once every scale down to 1x failed.
    pub async fn export(
        &self,
        snapshot: &RenderSnapshot,
        source: Arc<SourceImage>,
        request: ExportRequest,
    ) -> Result<ExportOutcome, ExportError> {
        let _guard = InFlight::acquire(&self.in_flight).ok_or(ExportError::Busy)?;
        if snapshot.document().image.is_none() {
            return Err(ExportError::NoImage);
        }
        request.tier.check(request.format, request.scale)?;
        let (route, adapter) = self.platform.route(request.action)?;

        let mut scale = request.scale;
        loop {
            tracing::debug!(%scale, format = %request.format, ?route, "Export attempt");
            let artifact = match self.render_and_encode(snapshot, &source, scale, request).await {
                Ok(artifact) => artifact,
                Err(e) => match scale.lower() {
                    Some(lower) => {
                        tracing::warn!("Export at {scale} failed, retrying at {lower}: {e}");
                        scale = lower;
                        continue;
                    }
                    None => {
                        self.set_phase(ExportPhase::Failed);
                        tracing::warn!("Export failed at every scale: {e}");
                        return Err(e);
                    }
                },
            };

            self.set_phase(ExportPhase::Delivering);
            return match adapter.deliver(request.action, &artifact).await {
                Ok(receipt) => {
                    self.set_phase(ExportPhase::Success);
                    tracing::info!(
                        %scale,
                        format = %request.format,
                        bytes = artifact.bytes.len(),
                        route = ?receipt.route,
                        "Export delivered"
                    );
                    Ok(ExportOutcome::Delivered(ExportReport {
                        artifact,
                        receipt,
                        requested_scale: request.scale,
                    }))
                }
                Err(DeliveryError::Cancelled) => {
                    self.set_phase(ExportPhase::Idle);
                    tracing::info!(%scale, "Export cancelled by user");
                    Ok(ExportOutcome::Cancelled { scale })
                }
                Err(e) => {
                    self.set_phase(ExportPhase::Failed);
                    tracing::warn!("Export delivery failed: {e}");
                    Err(e.into())
                }
            };
        }
    }

    fn set_phase(&self, phase: ExportPhase) {
        set_phase(&self.phase, phase);
    }

    /// Render and encode on the blocking pool.
    async fn render_and_encode(
        &self,
        snapshot: &RenderSnapshot,
        source: &Arc<SourceImage>,
        scale: ExportScale,
        request: ExportRequest,
    ) -> Result<ExportArtifact, ExportError> {
        self.set_phase(ExportPhase::Rendering);
        let renderer = self.renderer.clone();
        let snapshot = snapshot.clone();
        let source = Arc::clone(source);
        let pool = Arc::clone(&self.pool);
        let phase = Arc::clone(&self.phase);
        let limits = self.limits;

        tokio::task::spawn_blocking(move || -> Result<ExportArtifact, ExportError> {
            let surface = {
                let mut pool = pool
                    .lock()
                    .map_err(|_| ExportError::Task("canvas pool poisoned".to_string()))?;
                create_export_canvas(&renderer, &snapshot, &source, scale, &mut pool, limits)?
            };

            set_phase(&phase, ExportPhase::Encoding);
            let encoded = encode(&surface, request.format, request.jpeg_quality);
            let (width, height) = (surface.width(), surface.height());
            if let Ok(mut pool) = pool.lock() {
                pool.release(surface);
            }

            Ok(ExportArtifact {
                bytes: encoded?,
                format: request.format,
                scale,
                width,
                height,
            })
        })
        .await
        .map_err(|e| ExportError::Task(e.to_string()))?
    }
}

fn set_phase(sender: &watch::Sender<ExportPhase>, phase: ExportPhase) {
    let previous = sender.send_replace(phase);
    tracing::trace!(?previous, ?phase, "Export phase");
}
