//! Retry with exponential back-off and jitter for actor API calls.
//!
//! [`retry_with_backoff`] wraps one HTTP round trip and retries it on the
//! errors its predicate accepts. [`is_retriable`] covers network failures,
//! 429 and 5xx. A failed actor run is not transient at this level: retrying
//! the poll would only observe the same terminal status again.
//!
//! Requests that are not idempotent retry only on [`is_connect_failure`]:
//! once the request may have reached the server, sending it again could
//! start a second billable run.

use std::future::Future;
use std::time::Duration;

use crate::error::ScraperError;

/// Returns `true` for errors that are worth retrying after a back-off delay.
pub(crate) fn is_retriable(err: &ScraperError) -> bool {
    match err {
        ScraperError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        ScraperError::Api { status, .. } => *status == 429 || *status >= 500,
        ScraperError::RunFailed { .. }
        | ScraperError::Deserialize { .. }
        | ScraperError::InvalidBaseUrl { .. }
        | ScraperError::NotConfigured(_) => false,
    }
}

/// Returns `true` only when the request never reached the server.
pub(crate) fn is_connect_failure(err: &ScraperError) -> bool {
    matches!(err, ScraperError::Http(e) if e.is_connect())
}

/// Runs `operation` with up to `max_retries` additional attempts on the
/// errors `should_retry` accepts, usually [`is_retriable`].
///
/// The n-th retry waits `backoff_base_ms × 2ⁿ⁻¹` milliseconds ± 25 % jitter,
/// capped at 60 s. Other errors are returned immediately.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    should_retry: fn(&ScraperError) -> bool,
    mut operation: F,
) -> Result<T, ScraperError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ScraperError>>,
{
    const MAX_DELAY_MS: u64 = 60_000;
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !should_retry(&err) || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let computed = backoff_base_ms.saturating_mul(1u64 << (attempt - 1).min(10));
                let capped = computed.min(MAX_DELAY_MS);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "content source transient error, retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}
