//! Bounded retry with exponential backoff.
//!
//! Store conflicts and backend failures are retried by re-running the whole
//! read-modify-write closure, so each attempt re-reads fresh state.

use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::error::EngineError;

/// How many times to attempt an operation and how long to wait between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Never zero.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles each retry.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    /// Build a policy from configuration.
    pub const fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: if config.max_attempts == 0 {
                1
            } else {
                config.max_attempts
            },
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }

    /// A policy that tries once and never sleeps.
    pub const fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1_u32.checked_shl(retry.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Run `operation` until it succeeds, fails permanently, or attempts
    /// run out.
    ///
    /// Errors for which [`EngineError::is_retryable`] is false are returned
    /// at once. When every attempt fails with a retryable error the result
    /// is [`EngineError::RetriesExhausted`] wrapping the last one.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, EngineError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, EngineError>>,
    {
        let mut attempt: u32 = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) if attempt >= self.max_attempts => {
                    tracing::warn!(
                        operation = label,
                        attempts = attempt,
                        error = %err,
                        "Retries exhausted"
                    );
                    return Err(EngineError::RetriesExhausted {
                        attempts: attempt,
                        source: Box::new(err),
                    });
                }
                Err(err) => {
                    let delay = self.backoff(attempt);
                    tracing::debug!(
                        operation = label,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "Retrying after transient failure"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt = attempt.saturating_add(1);
                }
            }
        }
    }
}
