//! # SnapBeautify Renderer
//!
//! CPU rasterizer and export pipeline for beautified screenshots.
//!
//! ## Layers
//!
//! Every frame is painted back to front into one [`tiny_skia::Pixmap`]:
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ text overlays                               │
//! │ frame chrome      (rotated with the card)   │
//! │ source image      (clipped to the card)     │
//! │ drop shadow       (rotated with the card)   │
//! │ background                                  │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Vector layers are built as SVG and rasterized with `resvg`; the source
//! image is composited directly with `tiny-skia`.
//!
//! ## Export
//!
//! [`ExportPipeline`] renders at 1x-4x into surfaces borrowed from a
//! [`CanvasPool`], encodes with [`encode`], and hands the bytes to a
//! [`DeliveryAdapter`].

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod background;
mod chrome;
pub mod delivery;
pub mod error;
pub mod export;
pub mod image;
pub mod pool;
pub mod renderer;
mod svg;
mod text;

pub use delivery::{
    DeliveryAdapter, DeliveryReceipt, DeliveryRoute, ExportAction, ExportArtifact, FileDownload,
    Platform, PlatformCapabilities,
};
pub use error::{DeliveryError, ExportError, RenderError, RenderResult};
pub use export::{
    create_export_canvas, encode, ExportLimits, ExportOutcome, ExportPhase, ExportPipeline,
    ExportReport, ExportRequest, Tier,
};
pub use image::{DataUri, ImageFormat, SourceImage};
pub use pool::{CanvasPool, PoolConfig, PoolStats};
pub use renderer::Renderer;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
