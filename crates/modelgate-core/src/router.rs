//! Request router / load balancer.
//!
//! [`Router::select_backend`] filters the registry down to healthy backends
//! serving the requested model under the requested pattern, then picks one
//! according to the configured [`RouteStrategy`]. Callers wrap the actual
//! backend call in a [`DispatchGuard`] so `active_connections` stays
//! accurate under every strategy.

use crate::error::{GatewayError, GatewayResult};
use crate::registry::{BackendRegistry, BackendSnapshot};
use crate::types::IntegrationPattern;
use dashmap::DashMap;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

// ─────────────────────────────────────────────────────────────────────────────
// Strategy
// ─────────────────────────────────────────────────────────────────────────────

/// Backend selection strategy, chosen once at process configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteStrategy {
    /// Draw proportionally to descriptor weight.
    #[default]
    WeightedRandom,
    /// Pick the minimum `active_connections`; ties broken by weighted random.
    LeastConnections,
    /// Per-(pattern, model) rotating index.
    RoundRobin,
}

// ─────────────────────────────────────────────────────────────────────────────
// DispatchGuard
// ─────────────────────────────────────────────────────────────────────────────

/// RAII marker for an in-flight dispatch.
///
/// Increments the backend's `active_connections` on creation and decrements
/// on drop, so the counter is balanced even when the backend call errors or
/// the future is cancelled.
pub struct DispatchGuard {
    registry: Arc<BackendRegistry>,
    backend: String,
}

impl Drop for DispatchGuard {
    fn drop(&mut self) {
        self.registry.mark_dispatch_end(&self.backend);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

/// Health-aware backend selector.
pub struct Router {
    registry: Arc<BackendRegistry>,
    strategy: RouteStrategy,
    /// Rotating cursors for round-robin, keyed by `{pattern}:{model}`.
    cursors: DashMap<String, AtomicUsize>,
}

impl Router {
    /// Create a router over the given registry.
    pub fn new(registry: Arc<BackendRegistry>, strategy: RouteStrategy) -> Self {
        Self {
            registry,
            strategy,
            cursors: DashMap::new(),
        }
    }

    /// The strategy this router was configured with.
    pub fn strategy(&self) -> RouteStrategy {
        self.strategy
    }

    /// Select a healthy backend serving `model` under `pattern`.
    ///
    /// Returns [`GatewayError::Unavailable`] when no candidate exists;
    /// callers map this to a retryable condition.
    pub fn select_backend(
        &self,
        pattern: IntegrationPattern,
        model: &str,
    ) -> GatewayResult<BackendSnapshot> {
        let mut candidates: Vec<BackendSnapshot> = self
            .registry
            .list_by_pattern(pattern)
            .into_iter()
            .filter(|s| s.healthy && s.descriptor.model == model)
            .collect();

        if candidates.is_empty() {
            return Err(GatewayError::Unavailable {
                model: model.to_string(),
                pattern,
            });
        }

        // Stable order so round-robin rotation is deterministic.
        candidates.sort_by(|a, b| a.descriptor.name.cmp(&b.descriptor.name));

        let chosen = match self.strategy {
            RouteStrategy::WeightedRandom => Self::weighted_random(&candidates),
            RouteStrategy::LeastConnections => Self::least_connections(&candidates),
            RouteStrategy::RoundRobin => self.round_robin(pattern, model, &candidates),
        };
        Ok(candidates.swap_remove(chosen))
    }

    /// Begin a dispatch against the named backend, returning a guard that
    /// closes the accounting window when dropped.
    pub fn begin_dispatch(&self, backend: &str) -> DispatchGuard {
        self.registry.mark_dispatch_start(backend);
        DispatchGuard {
            registry: Arc::clone(&self.registry),
            backend: backend.to_string(),
        }
    }

    fn weighted_random(candidates: &[BackendSnapshot]) -> usize {
        let total: f64 = candidates.iter().map(|s| s.descriptor.weight).sum();
        let mut draw = rand::thread_rng().gen_range(0.0..total);
        for (i, candidate) in candidates.iter().enumerate() {
            draw -= candidate.descriptor.weight;
            if draw <= 0.0 {
                return i;
            }
        }
        candidates.len() - 1
    }

    fn least_connections(candidates: &[BackendSnapshot]) -> usize {
        let min = candidates
            .iter()
            .map(|s| s.active_connections)
            .min()
            .unwrap_or(0);
        let tied: Vec<usize> = candidates
            .iter()
            .enumerate()
            .filter(|(_, s)| s.active_connections == min)
            .map(|(i, _)| i)
            .collect();
        if tied.len() == 1 {
            return tied[0];
        }
        let tied_snapshots: Vec<BackendSnapshot> =
            tied.iter().map(|&i| candidates[i].clone()).collect();
        tied[Self::weighted_random(&tied_snapshots)]
    }

    fn round_robin(
        &self,
        pattern: IntegrationPattern,
        model: &str,
        candidates: &[BackendSnapshot],
    ) -> usize {
        let key = format!("{}:{}", pattern.as_str(), model);
        let cursor = self.cursors.entry(key).or_insert_with(|| AtomicUsize::new(0));
        cursor.fetch_add(1, Ordering::Relaxed) % candidates.len()
    }
}
