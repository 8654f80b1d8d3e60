//! Exponential backoff retry policy and call bounding.

use crate::error::{GatewayError, GatewayResult};
use std::future::Future;
use std::time::Duration;

/// Retry budget with exponential backoff, shared by the synchronous
/// dispatch path and the batch engine's sub-batch retries.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base: Duration,
    /// Upper bound on any single delay.
    pub cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base: Duration::from_millis(100),
            cap: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Same backoff curve with a different retry budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Delay before retry number `attempt` (0-based): `base * 2^attempt`,
    /// capped.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base
            .saturating_mul(1u32 << attempt.min(16))
            .min(self.cap)
    }
}

/// Bound a backend call by the descriptor's timeout, converting an elapsed
/// deadline into [`GatewayError::Timeout`]. Every cross-boundary call goes
/// through here so a misbehaving backend can never hang a worker.
pub(crate) async fn with_timeout<T>(
    timeout: Duration,
    backend: String,
    timeout_ms: u64,
    call: impl Future<Output = GatewayResult<T>>,
) -> GatewayResult<T> {
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(GatewayError::Timeout {
            backend,
            timeout_ms,
        }),
    }
}
