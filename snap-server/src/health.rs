//! Health check endpoints for container orchestration.
//!
//! Provides liveness and readiness checks:
//! - `/health/live` - Liveness check (restart if fails)
//! - `/health/ready` - Readiness check (remove from LB if fails)
//! - `/health` - Combined check for backward compatibility

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::AppState;

/// Health status response.
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    /// Overall status: "healthy" or "unhealthy"
    pub status: &'static str,
    /// Server version
    pub version: &'static str,
    /// Individual component checks
    pub checks: HealthChecks,
}

/// Individual health checks.
#[derive(Debug, Serialize)]
pub struct HealthChecks {
    /// Export output directory exists or could be created
    pub output_dir: bool,
    /// Webhook secret configured (informational)
    pub webhook_secret: bool,
    /// An export is running (informational)
    pub export_busy: bool,
}

/// Liveness check - is the server running?
///
/// Returns 200 OK if the process is alive.
#[tracing::instrument(name = "liveness_check")]
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// Readiness check - can exports be written?
///
/// Only the output directory decides readiness; webhooks without a secret
/// are answered with 500 but do not take the server out of rotation.
#[tracing::instrument(name = "readiness_check", skip(state))]
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<HealthStatus>) {
    let output_dir = tokio::fs::create_dir_all(&state.config.output_dir)
        .await
        .is_ok();

    let status = HealthStatus {
        status: if output_dir { "healthy" } else { "unhealthy" },
        version: env!("CARGO_PKG_VERSION"),
        checks: HealthChecks {
            output_dir,
            webhook_secret: state.config.webhook_secret().is_some(),
            export_busy: state.exports.is_busy(),
        },
    };

    let code = if output_dir {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (code, Json(status))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_status_serialization() {
        let status = HealthStatus {
            status: "healthy",
            version: "0.2.0",
            checks: HealthChecks {
                output_dir: true,
                webhook_secret: false,
                export_busy: false,
            },
        };

        let json = serde_json::to_string(&status).expect("should serialize");
        assert!(json.contains("healthy"));
        assert!(json.contains("0.2.0"));
        assert!(json.contains("output_dir"));
        assert!(json.contains("webhook_secret"));
    }

    #[tokio::test]
    async fn test_readiness_creates_output_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("nested/exports");
        let state = AppState::new(crate::ServerConfig::new(&out)).expect("state");

        let (code, Json(status)) = readiness(State(state)).await;
        assert_eq!(code, StatusCode::OK);
        assert!(status.checks.output_dir);
        assert!(!status.checks.webhook_secret);
        assert!(out.is_dir());
    }
}
