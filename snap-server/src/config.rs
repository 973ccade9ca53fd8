//! Server configuration from flags and environment.

use std::path::PathBuf;

use clap::Parser;
use snap_renderer::ExportLimits;

/// Default port for the server.
pub const DEFAULT_PORT: u16 = 9474;

/// Default number of exported files kept on disk.
pub const DEFAULT_MAX_STORED_EXPORTS: usize = 100;

/// Command-line and environment configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "snapbeautify", version, about = "SnapBeautify export and webhook server")]
pub struct ServerConfig {
    /// Port to listen on.
    #[arg(long, env = "SNAP_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Address to bind.
    #[arg(long, env = "SNAP_BIND", default_value = "127.0.0.1")]
    pub bind: std::net::IpAddr,

    /// Shared secret used to sign Razorpay webhooks.
    #[arg(long, env = "RAZORPAY_WEBHOOK_SECRET", hide_env_values = true)]
    pub webhook_secret: Option<String>,

    /// Directory that exported files are written to.
    #[arg(long, env = "SNAP_OUTPUT_DIR", default_value = "exports")]
    pub output_dir: PathBuf,

    /// Largest export surface, in pixels, before falling back to a lower scale.
    #[arg(long, env = "SNAP_MAX_EXPORT_PIXELS", default_value_t = ExportLimits::default().max_pixels)]
    pub max_export_pixels: u64,

    /// Exported files kept in the output directory; older ones are deleted.
    #[arg(long, env = "SNAP_MAX_STORED_EXPORTS", default_value_t = DEFAULT_MAX_STORED_EXPORTS)]
    pub max_stored_exports: usize,
}

impl ServerConfig {
    /// Configuration for tests and embedding: every default, no secret.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: std::net::IpAddr::from([127, 0, 0, 1]),
            webhook_secret: None,
            output_dir: output_dir.into(),
            max_export_pixels: ExportLimits::default().max_pixels,
            max_stored_exports: DEFAULT_MAX_STORED_EXPORTS,
        }
    }

    /// Set the webhook secret.
    #[must_use]
    pub fn with_webhook_secret(mut self, secret: impl Into<String>) -> Self {
        self.webhook_secret = Some(secret.into());
        self
    }

    /// The webhook secret, if one is set. An empty value counts as unset.
    #[must_use]
    pub fn webhook_secret(&self) -> Option<&str> {
        self.webhook_secret
            .as_deref()
            .filter(|secret| !secret.trim().is_empty())
    }

    /// Export limits derived from this configuration.
    #[must_use]
    pub fn export_limits(&self) -> ExportLimits {
        ExportLimits {
            max_pixels: self.max_export_pixels,
        }
    }

    /// Socket address to bind.
    #[must_use]
    pub fn addr(&self) -> std::net::SocketAddr {
        std::net::SocketAddr::new(self.bind, self.port)
    }
}
