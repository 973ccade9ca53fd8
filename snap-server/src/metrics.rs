//! Prometheus metrics for snap-server.
//!
//! Provides metrics collection and a Prometheus-compatible `/metrics` endpoint.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use snap_core::{ExportFormat, ExportScale};

// Metric names as constants for consistency
const WEBHOOK_EVENTS_TOTAL: &str = "snap_webhook_events_total";
const WEBHOOK_SIGNATURE_FAILURES_TOTAL: &str = "snap_webhook_signature_failures_total";
const EXPORT_ATTEMPTS_TOTAL: &str = "snap_export_attempts_total";
const EXPORT_OUTCOMES_TOTAL: &str = "snap_export_outcomes_total";
const EXPORT_DOWNGRADES_TOTAL: &str = "snap_export_downgrades_total";
const EXPORT_DURATION: &str = "snap_export_duration_seconds";
const VALIDATION_FAILURES_TOTAL: &str = "snap_validation_failures_total";

/// Initialize metrics and return the Prometheus handle.
///
/// # Errors
///
/// Returns an error if the Prometheus recorder cannot be installed
/// (e.g., if another recorder is already installed).
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Record a verified webhook.
///
/// # Arguments
///
/// * `kind` - "subscription", "payment" or "ignored"
pub fn record_webhook_event(kind: &str) {
    counter!(WEBHOOK_EVENTS_TOTAL, "kind" => kind.to_string()).increment(1);
}

/// Record a webhook rejected for its signature.
pub fn record_signature_failure() {
    counter!(WEBHOOK_SIGNATURE_FAILURES_TOTAL).increment(1);
}

/// Record an export request.
pub fn record_export_attempt(format: ExportFormat, scale: ExportScale) {
    counter!(
        EXPORT_ATTEMPTS_TOTAL,
        "format" => format.extension(),
        "scale" => scale.to_string()
    )
    .increment(1);
}

/// Record how an export ended.
///
/// # Arguments
///
/// * `outcome` - "delivered", "cancelled" or an error kind
/// * `duration_secs` - Time from request to outcome
pub fn record_export_outcome(outcome: &str, duration_secs: f64) {
    counter!(EXPORT_OUTCOMES_TOTAL, "outcome" => outcome.to_string()).increment(1);
    histogram!(EXPORT_DURATION, "outcome" => outcome.to_string()).record(duration_secs);
}

/// Record an export delivered below the requested scale.
pub fn record_export_downgrade(requested: ExportScale, delivered: ExportScale) {
    counter!(
        EXPORT_DOWNGRADES_TOTAL,
        "requested" => requested.to_string(),
        "delivered" => delivered.to_string()
    )
    .increment(1);
}

/// Record an input validation failure.
///
/// # Arguments
///
/// * `code` - Validation code (`INVALID_FILE_TYPE`, `FILE_TOO_LARGE`, ...)
pub fn record_validation_failure(code: &str) {
    counter!(VALIDATION_FAILURES_TOTAL, "code" => code.to_string()).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_webhook_event("payment");
        record_signature_failure();
        record_export_attempt(ExportFormat::Png, ExportScale::X2);
        record_export_outcome("delivered", 0.5);
        record_export_downgrade(ExportScale::X4, ExportScale::X3);
        record_validation_failure("FILE_TOO_LARGE");
    }
}
