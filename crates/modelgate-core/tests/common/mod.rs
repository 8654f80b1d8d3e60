//! Shared test doubles for the provider and vector-store collaborators.

// Not every test binary uses every double.
#![allow(dead_code)]

use async_trait::async_trait;
use modelgate_core::{
    BackendDescriptor, GatewayError, GatewayResult, ProviderClient, VectorRecord, VectorStore,
};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Scriptable embedding provider: embeddings are constant vectors of the
/// backend's configured dimension.
#[derive(Default)]
pub struct MockProvider {
    pub fail_embed: AtomicBool,
    pub healthy: AtomicBool,
    pub embed_calls: AtomicUsize,
    /// Artificial latency per embed call, to widen race windows in tests.
    pub embed_delay: Option<Duration>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            fail_embed: AtomicBool::new(false),
            healthy: AtomicBool::new(true),
            embed_calls: AtomicUsize::new(0),
            embed_delay: None,
        }
    }

    pub fn with_embed_delay(mut self, delay: Duration) -> Self {
        self.embed_delay = Some(delay);
        self
    }
}

#[async_trait]
impl ProviderClient for MockProvider {
    async fn embed(
        &self,
        backend: &BackendDescriptor,
        inputs: &[Value],
    ) -> GatewayResult<Vec<Vec<f32>>> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.embed_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_embed.load(Ordering::SeqCst) {
            return Err(GatewayError::Backend {
                backend: backend.name.clone(),
                message: "simulated provider failure".into(),
            });
        }
        Ok(vec![vec![0.25; backend.dimension]; inputs.len()])
    }

    async fn health(&self, _backend: &BackendDescriptor) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }
}

/// In-memory vector store keyed by collection.
#[derive(Default)]
pub struct MockStore {
    pub records: Mutex<HashMap<String, Vec<VectorRecord>>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, collection: &str) -> usize {
        self.records
            .lock()
            .unwrap()
            .get(collection)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl VectorStore for MockStore {
    async fn search(
        &self,
        collection: &str,
        _vector: &[f32],
        limit: usize,
        _filter: Option<&Value>,
    ) -> GatewayResult<Value> {
        let records = self.records.lock().unwrap();
        let hits: Vec<Value> = records
            .get(collection)
            .map(|rs| {
                rs.iter()
                    .take(limit)
                    .map(|r| json!({ "id": r.id, "score": 0.9 }))
                    .collect()
            })
            .unwrap_or_default();
        Ok(json!(hits))
    }

    async fn upsert(&self, collection: &str, records: &[VectorRecord]) -> GatewayResult<()> {
        let mut store = self.records.lock().unwrap();
        let bucket = store.entry(collection.to_string()).or_default();
        for record in records {
            bucket.retain(|existing| existing.id != record.id);
            bucket.push(record.clone());
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, ids: &[String]) -> GatewayResult<()> {
        let mut store = self.records.lock().unwrap();
        if let Some(bucket) = store.get_mut(collection) {
            bucket.retain(|record| !ids.contains(&record.id));
        }
        Ok(())
    }

    async fn health(&self) -> bool {
        true
    }
}
