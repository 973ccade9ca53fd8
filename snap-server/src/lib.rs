//! # SnapBeautify Server Library
//!
//! Shared types and routing for the `snapbeautify` server.
//! This library is used by both the binary and integration tests.
//!
//! | Route                        | Handler                         |
//! |------------------------------|---------------------------------|
//! | `POST /api/razorpay/webhook` | [`webhook::razorpay_webhook`]   |
//! | `POST /api/export`           | [`routes::export_handler`]      |
//! | `GET /health/live`           | [`health::liveness`]            |
//! | `GET /health/ready`          | [`health::readiness`]           |

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use snap_core::{RetryConfig, MAX_UPLOAD_BYTES};
use snap_renderer::{ExportPipeline, FileDownload, Platform, Renderer};

pub mod config;
pub mod fetch;
pub mod health;
pub mod metrics;
pub mod routes;
pub mod subscription;
pub mod webhook;

pub use config::ServerConfig;
pub use fetch::{FetchError, ImageFetcher};
pub use subscription::SubscriptionLedger;

/// Largest request body: a maximal upload in base64 plus the document.
pub const MAX_REQUEST_BYTES: usize = (MAX_UPLOAD_BYTES as usize) / 3 * 4 + 1024 * 1024;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Subscription ledger fed by webhooks.
    pub ledger: SubscriptionLedger,
    /// Export pipeline writing into the output directory.
    pub exports: Arc<ExportPipeline>,
    /// Client for `image_url` sources.
    pub fetcher: ImageFetcher,
}

impl AppState {
    /// Build state from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if the HTTP client cannot be created.
    pub fn new(config: ServerConfig) -> Result<Self, FetchError> {
        let downloads =
            FileDownload::new(&config.output_dir).with_retention(config.max_stored_exports);
        let exports = ExportPipeline::new(Renderer::new(), Platform::with_download(downloads))
            .with_limits(config.export_limits());

        Ok(Self {
            exports: Arc::new(exports),
            ledger: SubscriptionLedger::new(),
            fetcher: ImageFetcher::new(RetryConfig::default())?,
            config: Arc::new(config),
        })
    }

    /// Get a reference to the subscription ledger.
    pub fn ledger(&self) -> &SubscriptionLedger {
        &self.ledger
    }
}

/// Application routes, without middleware layers.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route("/health", get(health::readiness))
        .route("/api/razorpay/webhook", post(webhook::razorpay_webhook))
        .route(
            "/api/export",
            post(routes::export_handler).layer(DefaultBodyLimit::max(MAX_REQUEST_BYTES)),
        )
        .with_state(state)
}
