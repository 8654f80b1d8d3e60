//! Gateway configuration.
//!
//! Loaded once at startup (typically from a JSON file plus environment
//! overrides in `main`). [`GatewayConfig::validate`] runs before anything is
//! wired up; a [`GatewayError::Config`] here is fatal and prevents the
//! gateway from starting.

use crate::error::{GatewayError, GatewayResult};
use crate::registry::BackendDescriptor;
use crate::router::RouteStrategy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Static process configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Backend providers registered at startup.
    pub backends: Vec<BackendDescriptor>,
    /// Load-balancing strategy.
    pub strategy: RouteStrategy,
    /// Hybrid requests below this item count run synchronously.
    pub hybrid_sync_threshold: usize,
    /// Items per batch sub-batch.
    pub sub_batch_size: usize,
    /// Batch worker pool size.
    pub workers: usize,
    /// Seconds between health-check rounds.
    pub health_interval_secs: u64,
    /// Per-backend health probe timeout, seconds.
    pub health_timeout_secs: u64,
    /// Consecutive failed checks before a backend is excluded.
    pub health_fail_threshold: u32,
    /// Seconds between cache sweeps.
    pub cache_sweep_secs: u64,
    /// Cache TTL for search results, seconds.
    pub search_ttl_secs: u64,
    /// Cache TTL for embeddings, seconds.
    pub embed_ttl_secs: u64,
    /// TCP port the HTTP surface listens on.
    pub port: u16,
    /// Valid gateway API keys. Empty disables authentication.
    pub api_keys: Vec<String>,
    /// Base URL of the external vector store.
    pub vector_store_url: String,
    /// Vector store call timeout, seconds.
    pub vector_store_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            backends: Vec::new(),
            strategy: RouteStrategy::default(),
            hybrid_sync_threshold: 50,
            sub_batch_size: 100,
            workers: 3,
            health_interval_secs: 15,
            health_timeout_secs: 2,
            health_fail_threshold: 3,
            cache_sweep_secs: 60,
            search_ttl_secs: 300,
            embed_ttl_secs: 3600,
            port: 8080,
            api_keys: Vec::new(),
            vector_store_url: "http://127.0.0.1:6333".to_string(),
            vector_store_timeout_secs: 30,
        }
    }
}

impl GatewayConfig {
    /// Validate the whole configuration before wiring anything up.
    pub fn validate(&self) -> GatewayResult<()> {
        if self.backends.is_empty() {
            return Err(GatewayError::Config(
                "at least one backend must be configured".into(),
            ));
        }
        let mut names = HashSet::new();
        for backend in &self.backends {
            backend.validate()?;
            if !names.insert(backend.name.as_str()) {
                return Err(GatewayError::Config(format!(
                    "duplicate backend name '{}'",
                    backend.name
                )));
            }
        }
        if self.workers == 0 {
            return Err(GatewayError::Config("workers must be > 0".into()));
        }
        if self.sub_batch_size == 0 {
            return Err(GatewayError::Config("sub_batch_size must be > 0".into()));
        }
        if self.hybrid_sync_threshold == 0 {
            return Err(GatewayError::Config(
                "hybrid_sync_threshold must be > 0".into(),
            ));
        }
        if self.health_interval_secs == 0 || self.health_timeout_secs == 0 {
            return Err(GatewayError::Config(
                "health check interval and timeout must be > 0".into(),
            ));
        }
        if self.health_fail_threshold == 0 {
            return Err(GatewayError::Config(
                "health_fail_threshold must be > 0".into(),
            ));
        }
        Ok(())
    }
}
