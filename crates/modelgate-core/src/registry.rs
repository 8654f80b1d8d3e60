//! Backend registry — the single source of truth for provider descriptors.
//!
//! Descriptors are created at startup from static configuration. The only
//! runtime mutations are `healthy` (owned by the health checker through
//! [`BackendRegistry::set_health`]) and `active_connections` (owned by the
//! router through the dispatch markers). External code never mutates
//! descriptor fields directly.
//!
//! Entries are independent, so the registry uses a [`DashMap`] with
//! per-entry atomics rather than one lock across the whole table.

use crate::error::{GatewayError, GatewayResult};
use crate::types::IntegrationPattern;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tracing::{debug, warn};

// ─────────────────────────────────────────────────────────────────────────────
// BackendDescriptor
// ─────────────────────────────────────────────────────────────────────────────

/// Static description of one external model provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackendDescriptor {
    /// Unique stable identifier.
    pub name: String,
    /// Model name this backend serves. Several backends may serve the same
    /// model (horizontal scaling); defaults to `name`.
    #[serde(default)]
    pub model: String,
    /// Network address of the provider.
    pub endpoint: String,
    /// Integration pattern applied to requests targeting this backend.
    pub pattern: IntegrationPattern,
    /// Expected vector width of embeddings this backend produces.
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    /// Load-balancing weight; must be positive.
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Per-call timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Retry budget for synchronous dispatch and job-level batch retries.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_dimension() -> usize {
    768
}

fn default_weight() -> f64 {
    1.0
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    3
}

impl BackendDescriptor {
    /// Construct a descriptor with defaults (`model` = `name`, weight 1.0,
    /// dimension 768, timeout 30s, 3 retries).
    pub fn new(
        name: impl Into<String>,
        pattern: IntegrationPattern,
        endpoint: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            model: name.clone(),
            name,
            endpoint: endpoint.into(),
            pattern,
            dimension: default_dimension(),
            weight: default_weight(),
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
        }
    }

    /// Builder: set the served model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Builder: set the expected vector width.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    /// Builder: set the load-balancing weight.
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Builder: set the per-call timeout.
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Builder: set the retry budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sanity checks run at registration time.
    pub fn validate(&self) -> GatewayResult<()> {
        if self.name.trim().is_empty() {
            return Err(GatewayError::Config("backend name cannot be empty".into()));
        }
        if self.endpoint.trim().is_empty() {
            return Err(GatewayError::Config(format!(
                "backend '{}': endpoint cannot be empty",
                self.name
            )));
        }
        if self.weight <= 0.0 {
            return Err(GatewayError::Config(format!(
                "backend '{}': weight must be positive (got {})",
                self.name, self.weight
            )));
        }
        if self.dimension == 0 {
            return Err(GatewayError::Config(format!(
                "backend '{}': dimension must be positive",
                self.name
            )));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// BackendSnapshot
// ─────────────────────────────────────────────────────────────────────────────

/// Point-in-time copy of a registry entry, safe to hold across awaits.
#[derive(Debug, Clone)]
pub struct BackendSnapshot {
    pub descriptor: BackendDescriptor,
    pub healthy: bool,
    pub active_connections: u32,
}

struct BackendEntry {
    descriptor: BackendDescriptor,
    healthy: AtomicBool,
    active_connections: AtomicU32,
}

impl BackendEntry {
    fn snapshot(&self) -> BackendSnapshot {
        BackendSnapshot {
            descriptor: self.descriptor.clone(),
            healthy: self.healthy.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// BackendRegistry
// ─────────────────────────────────────────────────────────────────────────────

/// Concurrent registry of backend descriptors and their runtime state.
#[derive(Default)]
pub struct BackendRegistry {
    entries: DashMap<String, BackendEntry>,
}

impl BackendRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a backend by name.
    ///
    /// Newly registered backends start healthy so routing works before the
    /// first health check completes; the checker takes over from there.
    pub fn register(&self, mut descriptor: BackendDescriptor) -> GatewayResult<()> {
        // A descriptor deserialized without a `model` field serves itself.
        if descriptor.model.is_empty() {
            descriptor.model = descriptor.name.clone();
        }
        descriptor.validate()?;
        debug!(backend = %descriptor.name, model = %descriptor.model, "registering backend");
        self.entries.insert(
            descriptor.name.clone(),
            BackendEntry {
                descriptor,
                healthy: AtomicBool::new(true),
                active_connections: AtomicU32::new(0),
            },
        );
        Ok(())
    }

    /// Look up a backend by its unique name.
    pub fn get(&self, name: &str) -> Option<BackendSnapshot> {
        self.entries.get(name).map(|e| e.snapshot())
    }

    /// All backends registered under the given integration pattern.
    pub fn list_by_pattern(&self, pattern: IntegrationPattern) -> Vec<BackendSnapshot> {
        self.entries
            .iter()
            .filter(|e| e.descriptor.pattern == pattern)
            .map(|e| e.snapshot())
            .collect()
    }

    /// Snapshot every registered backend.
    pub fn list_all(&self) -> Vec<BackendSnapshot> {
        self.entries.iter().map(|e| e.snapshot()).collect()
    }

    /// First backend serving `model`, regardless of health.
    ///
    /// Used to resolve the model's integration pattern and retry budget; the
    /// router performs the health-aware selection.
    pub fn find_model(&self, model: &str) -> Option<BackendSnapshot> {
        self.entries
            .iter()
            .find(|e| e.descriptor.model == model)
            .map(|e| e.snapshot())
    }

    /// Set the health flag of a backend. Idempotent; the health checker is
    /// the only caller in production.
    pub fn set_health(&self, name: &str, healthy: bool) -> bool {
        match self.entries.get(name) {
            Some(entry) => {
                let was = entry.healthy.swap(healthy, Ordering::Relaxed);
                if was != healthy {
                    debug!(backend = %name, healthy, "backend health changed");
                }
                true
            }
            None => false,
        }
    }

    /// Record the start of a dispatch against a backend.
    pub fn mark_dispatch_start(&self, name: &str) {
        if let Some(entry) = self.entries.get(name) {
            entry.active_connections.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record the end of a dispatch against a backend.
    ///
    /// Decrementing a zero counter indicates unbalanced markers somewhere in
    /// the dispatch path; it is logged and ignored rather than wrapping.
    pub fn mark_dispatch_end(&self, name: &str) {
        if let Some(entry) = self.entries.get(name) {
            let result = entry.active_connections.fetch_update(
                Ordering::Relaxed,
                Ordering::Relaxed,
                |n| n.checked_sub(1),
            );
            if result.is_err() {
                warn!(backend = %name, "dispatch end on zero connection counter");
            }
        }
    }

    /// Number of registered backends.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
