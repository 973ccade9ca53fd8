//! # SnapBeautify Core
//!
//! Editor state and interaction logic for screenshot beautification.
//! Rendering lives in `snap-renderer`; this crate has no pixel code.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                 snap-core                   │
//! ├─────────────────────────────────────────────┤
//! │  Document        │  Interaction             │
//! │  - Background    │  - Hit testing           │
//! │  - Frame/Shadow  │  - Drag + center snap    │
//! │  - Overlays/Crop │  - Frame coalescing      │
//! ├─────────────────────────────────────────────┤
//! │  Store           │  Resilience              │
//! │  - Reducer       │  - Error taxonomy        │
//! │  - Subscribers   │  - Retry with backoff    │
//! │  - Snapshots     │  - Upload validation     │
//! └─────────────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod document;
pub mod error;
pub mod frame;
pub mod interaction;
pub mod overlay;
pub mod retry;
pub mod schedule;
pub mod store;
pub mod style;
pub mod validation;

pub use document::{
    CanvasSize, CropArea, EditorDocument, ExportFormat, ExportScale, ExportSettings, Geometry,
    ImageRef, PixelRect, Rect, Shadow, MIN_CROP_PERCENT,
};
pub use error::{friendly_error, EditorError, EditorResult, ErrorKind, FriendlyError, HasErrorKind};
pub use frame::{FrameInsets, FrameKind};
pub use interaction::{
    apply_center_snap, ApproximateMetrics, CanvasRect, DragController, DragPreview, DragState,
    HitTestCache, SnapGuides, TextMeasurer, CENTER_SNAP_THRESHOLD,
};
pub use overlay::{clamp_percent, FontSpec, OverlayId, TextFill, TextOverlay};
pub use retry::{retry_with_backoff, RetryConfig};
pub use schedule::{FrameScheduler, RenderThrottle, ThrottleConfig, ThrottleDecision};
pub use store::{EditorAction, EditorStore, RenderSnapshot, StoreEvent, SubscriberId};
pub use style::{Background, Color, GradientStop, LinearGradient, MeshPoint};
pub use validation::{validate_upload, violations, UploadError, UploadInfo, MAX_UPLOAD_BYTES};

/// Core crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
