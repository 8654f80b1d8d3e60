//! Gateway error taxonomy.
//!
//! [`GatewayError`] covers every failure mode a caller can observe:
//! validation rejections (never retried), routing dead-ends, backend
//! failures and timeouts (retryable), fatal configuration errors caught at
//! startup, and job-store lookups. Batch workers never surface these
//! synchronously — item failures accumulate on the job record instead.

use crate::batch::JobStatus;
use crate::types::IntegrationPattern;
use thiserror::Error;

/// Errors produced by the gateway core components.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Malformed or empty input, rejected before any dispatch.
    #[error("invalid request: {0}")]
    Validation(String),

    /// No healthy backend exists for the requested model/pattern.
    #[error("no healthy backend for model '{model}' (pattern: {})", pattern.as_str())]
    Unavailable {
        model: String,
        pattern: IntegrationPattern,
    },

    /// The provider responded with a failure.
    #[error("backend '{backend}' failed: {message}")]
    Backend { backend: String, message: String },

    /// The provider did not respond within the configured timeout.
    #[error("backend '{backend}' timed out after {timeout_ms}ms")]
    Timeout { backend: String, timeout_ms: u64 },

    /// Invalid configuration detected at startup; prevents the gateway
    /// from starting.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// No batch job with this id exists.
    #[error("job '{0}' not found")]
    JobNotFound(String),

    /// The batch job has already reached a terminal state.
    #[error("job '{job_id}' is already terminal ({status:?})")]
    AlreadyTerminal { job_id: String, status: JobStatus },
}

impl GatewayError {
    /// Whether a caller may reasonably retry the same request.
    ///
    /// `Timeout` and `Unavailable` are transient; `Backend` may be (the
    /// provider decides), so it is treated as retryable for backoff
    /// accounting. Validation and configuration errors are never retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::Unavailable { .. }
                | GatewayError::Backend { .. }
                | GatewayError::Timeout { .. }
        )
    }
}

/// Convenience alias used throughout the crate.
pub type GatewayResult<T> = Result<T, GatewayError>;
