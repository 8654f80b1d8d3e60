//! Background backend health checker.
//!
//! Probes every registered backend on a fixed interval with a short
//! per-check timeout. A backend is excluded from routing only after a
//! configurable number of consecutive failures; a single passing check
//! restores it immediately. This is the only admission-control mechanism —
//! backends are never removed automatically.

use crate::provider::ProviderClient;
use crate::registry::BackendRegistry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Tunables for the health-check loop.
#[derive(Debug, Clone)]
pub struct HealthCheckerConfig {
    /// Pause between check rounds.
    pub interval: Duration,
    /// Per-backend probe timeout.
    pub timeout: Duration,
    /// Consecutive failures before a backend is marked unhealthy.
    pub fail_threshold: u32,
}

impl Default for HealthCheckerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15),
            timeout: Duration::from_secs(2),
            fail_threshold: 3,
        }
    }
}

/// Periodic health prober; sole writer of the registry's `healthy` flags.
pub struct HealthChecker {
    registry: Arc<BackendRegistry>,
    provider: Arc<dyn ProviderClient>,
    config: HealthCheckerConfig,
    consecutive_failures: DashMap<String, u32>,
}

impl HealthChecker {
    /// Create a checker over the given registry and provider client.
    pub fn new(
        registry: Arc<BackendRegistry>,
        provider: Arc<dyn ProviderClient>,
        config: HealthCheckerConfig,
    ) -> Self {
        Self {
            registry,
            provider,
            config,
            consecutive_failures: DashMap::new(),
        }
    }

    /// Run one round of checks against every registered backend.
    ///
    /// Public so tests (and admin tooling) can force a round without waiting
    /// for the interval timer.
    pub async fn check_all(&self) {
        for snapshot in self.registry.list_all() {
            let descriptor = &snapshot.descriptor;
            let probe = self.provider.health(descriptor);
            let ok = tokio::time::timeout(self.config.timeout, probe)
                .await
                .unwrap_or(false);

            if ok {
                self.consecutive_failures.remove(&descriptor.name);
                self.registry.set_health(&descriptor.name, true);
                debug!(backend = %descriptor.name, "health check passed");
            } else {
                let failures = {
                    let mut entry = self
                        .consecutive_failures
                        .entry(descriptor.name.clone())
                        .or_insert(0);
                    *entry += 1;
                    *entry
                };
                if failures >= self.config.fail_threshold {
                    warn!(
                        backend = %descriptor.name,
                        failures,
                        "backend excluded from routing after consecutive health failures"
                    );
                    self.registry.set_health(&descriptor.name, false);
                } else {
                    debug!(backend = %descriptor.name, failures, "health check failed");
                }
            }
        }
    }

    /// Spawn the check loop as a background task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.check_all().await;
            }
        })
    }
}
