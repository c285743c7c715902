//! Retry with exponential backoff for transient storage failures.

use crate::storage::traits::StorageResult;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

/// Configuration for retry behavior
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 100,
            max_delay_ms: 5000,
        }
    }
}

impl RetryConfig {
    /// A single attempt, no retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }
}

/// Run `operation`, retrying it while it fails with a retryable error kind.
///
/// `what` names the operation in log messages.
///
/// # Errors
///
/// Returns the last error when it is not retryable or when
/// `config.max_attempts` is exhausted.
pub fn retry_with_backoff<F, T>(config: &RetryConfig, what: &str, mut operation: F) -> StorageResult<T>
where
    F: FnMut() -> StorageResult<T>,
{
    let mut attempt = 0;
    let mut delay_ms = config.initial_delay_ms;

    loop {
        attempt += 1;
        match operation() {
            Ok(result) => return Ok(result),
            Err(err) => {
                if !err.kind.is_retryable() || attempt >= config.max_attempts.max(1) {
                    return Err(err);
                }
                warn!(attempt, delay_ms, error = %err, "{what} failed, retrying");
                std::thread::sleep(Duration::from_millis(delay_ms));
                delay_ms = delay_ms.saturating_mul(2).min(config.max_delay_ms);
            }
        }
    }
}
