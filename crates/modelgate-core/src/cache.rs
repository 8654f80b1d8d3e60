//! Response cache with TTL and prefix invalidation.
//!
//! Keys are derived from `(model, operation, payload)` only — request ids
//! and receipt timestamps never reach the key, so logically identical
//! requests hit the same entry. The model name leads the key so that
//! out-of-band data changes can drop everything for one model with a single
//! prefix sweep.
//!
//! Expired entries are evicted lazily on access and eagerly by a background
//! sweeper to bound memory growth.

use crate::types::Operation;
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::debug;

struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Counters exposed on the aggregate health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Concurrent key→value store consulted before every dispatch.
#[derive(Default)]
pub struct ResponseCache {
    entries: DashMap<String, CacheEntry>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResponseCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deterministic key: `{model}:{operation}:{sha256(payload)}`.
    ///
    /// `serde_json::Value` objects serialize with sorted keys, so two
    /// payloads that are structurally equal hash identically regardless of
    /// the order the caller supplied fields in.
    pub fn cache_key(operation: Operation, model: &str, payload: &Value) -> String {
        let mut hasher = Sha256::new();
        hasher.update(operation.as_str().as_bytes());
        hasher.update(b"\0");
        hasher.update(payload.to_string().as_bytes());
        format!("{}:{}:{:x}", model, operation.as_str(), hasher.finalize())
    }

    /// Fetch a cached value, lazily evicting it when expired.
    pub fn get(&self, operation: Operation, model: &str, payload: &Value) -> Option<Value> {
        let key = Self::cache_key(operation, model, payload);
        if let Some(entry) = self.entries.get(&key) {
            if !entry.is_expired() {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.value.clone());
            }
        }
        // Drop the read guard before removing.
        self.entries.remove_if(&key, |_, e| e.is_expired());
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store a value, overwriting any existing entry for the same key.
    pub fn put(
        &self,
        operation: Operation,
        model: &str,
        payload: &Value,
        value: Value,
        ttl: Duration,
    ) {
        let key = Self::cache_key(operation, model, payload);
        self.entries.insert(
            key,
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Remove every entry whose key starts with `prefix`. Returns the number
    /// of entries removed.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(prefix));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(prefix, removed, "cache invalidation");
        }
        removed
    }

    /// Drop all cached results for a model. Called when the model's data
    /// changes (Upsert/Delete side effects or out-of-band notification).
    pub fn invalidate_model(&self, model: &str) -> usize {
        self.invalidate_prefix(&format!("{model}:"))
    }

    /// Remove all expired entries. Returns the number evicted.
    pub fn sweep(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        before.saturating_sub(self.entries.len())
    }

    /// Spawn the background sweep loop.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let evicted = cache.sweep();
                if evicted > 0 {
                    debug!(evicted, "cache sweep evicted expired entries");
                }
            }
        })
    }

    /// Current entry count and hit/miss counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
