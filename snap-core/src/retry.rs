//! Retry with exponential backoff.
//!
//! Used for operations that fail transiently, such as fetching or decoding
//! a remote image. Errors whose [`ErrorKind`](crate::ErrorKind) is not
//! retryable are returned immediately.

use std::future::Future;
use std::time::Duration;

use crate::error::HasErrorKind;

/// Backoff configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt. Total attempts = `max_retries + 1`.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Growth factor per attempt.
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration with custom values.
    #[must_use]
    pub fn new(
        max_retries: u32,
        base_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f64,
    ) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
            backoff_multiplier,
        }
    }

    /// Delay between attempt `attempt` and `attempt + 1` (0-indexed).
    #[must_use]
    #[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let factor = self.backoff_multiplier.max(1.0).powi(exponent);
        let secs = self.base_delay.as_secs_f64() * factor;
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}

/// Run `op` until it succeeds, retrying retryable failures with backoff.
///
/// `op` receives the 0-indexed attempt number.
///
/// # Errors
///
/// Returns the last error once `max_retries` retries are exhausted, or the
/// first non-retryable error.
pub async fn retry_with_backoff<T, E, F, Fut>(config: &RetryConfig, mut op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: HasErrorKind + std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) => {
                let kind = error.error_kind();
                if !kind.is_retryable() {
                    tracing::debug!(?kind, "Not retrying: {error}");
                    return Err(error);
                }
                if attempt >= config.max_retries {
                    tracing::warn!(
                        "Giving up after {} attempts: {error}",
                        attempt + 1
                    );
                    return Err(error);
                }
                let delay = config.delay_for_attempt(attempt);
                tracing::warn!(
                    "Attempt {}/{} failed, retrying in {}ms: {error}",
                    attempt + 1,
                    config.max_retries + 1,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
