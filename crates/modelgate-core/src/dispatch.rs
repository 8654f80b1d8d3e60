//! Pattern dispatcher — decides synchronous vs. queued execution.
//!
//! One dispatch function per [`IntegrationPattern`] variant, selected by a
//! single `match`. RealTime executes synchronously with retry/backoff;
//! BulkOnly always enqueues a batch job and returns a handle without ever
//! touching a backend; Hybrid picks one of the two based on the urgency
//! hint and implied batch size.
//!
//! Search is the one exception: it produces an immediate result set and has
//! no meaningful queued form, so it always runs synchronously regardless of
//! the model's pattern.

use crate::batch::{BatchEngine, JobHandle, embed_input, item_id, validate_item};
use crate::cache::ResponseCache;
use crate::error::{GatewayError, GatewayResult};
use crate::provider::ProviderClient;
use crate::registry::{BackendDescriptor, BackendRegistry, BackendSnapshot};
use crate::retry::{RetryPolicy, with_timeout};
use crate::router::Router;
use crate::store::{VectorRecord, VectorStore};
use crate::types::{GatewayRequest, IntegrationPattern, Operation};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

// ─────────────────────────────────────────────────────────────────────────────
// Outcome and hooks
// ─────────────────────────────────────────────────────────────────────────────

/// Result of dispatching a [`GatewayRequest`].
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    /// The request was executed synchronously.
    Completed {
        value: Value,
        /// Whether the value came from the response cache.
        cached: bool,
        /// Which backend served it; `None` on a cache hit.
        backend: Option<String>,
    },
    /// The request was queued as a batch job.
    Queued(JobHandle),
}

/// Pluggable post-processing applied to synchronous results before they are
/// cached and returned (e.g. re-validating embeddings with a local pass).
///
/// Enrichment failures must not fail the request: the dispatcher logs them
/// and proceeds with the unenriched value.
#[async_trait]
pub trait Enricher: Send + Sync {
    async fn enrich(&self, backend: &BackendDescriptor, value: &mut Value) -> GatewayResult<()>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Dispatcher tunables.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Hybrid requests below this item count run synchronously.
    pub hybrid_sync_threshold: usize,
    /// Backoff curve for the synchronous path. `max_retries` is overridden
    /// per request by the backend descriptor's budget.
    pub retry: RetryPolicy,
    /// Cache TTL for search results.
    pub search_ttl: Duration,
    /// Cache TTL for embeddings.
    pub embed_ttl: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            hybrid_sync_threshold: 50,
            retry: RetryPolicy::default(),
            search_ttl: Duration::from_secs(300),
            embed_ttl: Duration::from_secs(3600),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// PatternDispatcher
// ─────────────────────────────────────────────────────────────────────────────

/// Routes each request through cache → pattern decision → execution.
pub struct PatternDispatcher {
    registry: Arc<BackendRegistry>,
    router: Arc<Router>,
    cache: Arc<ResponseCache>,
    engine: Arc<BatchEngine>,
    provider: Arc<dyn ProviderClient>,
    store: Arc<dyn VectorStore>,
    enricher: Option<Arc<dyn Enricher>>,
    config: DispatcherConfig,
}

impl PatternDispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<BackendRegistry>,
        router: Arc<Router>,
        cache: Arc<ResponseCache>,
        engine: Arc<BatchEngine>,
        provider: Arc<dyn ProviderClient>,
        store: Arc<dyn VectorStore>,
        enricher: Option<Arc<dyn Enricher>>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            registry,
            router,
            cache,
            engine,
            provider,
            store,
            enricher,
            config,
        }
    }

    /// Dispatch a normalized request. This is the single entry point every
    /// protocol front-end calls.
    pub async fn dispatch(&self, request: &GatewayRequest) -> GatewayResult<DispatchOutcome> {
        let primary = self
            .registry
            .find_model(&request.target_model)
            .ok_or_else(|| {
                GatewayError::Validation(format!("unknown model '{}'", request.target_model))
            })?;
        let pattern = primary.descriptor.pattern;

        if request.operation.is_cacheable() {
            if let Some(value) =
                self.cache
                    .get(request.operation, &request.target_model, &request.payload)
            {
                debug!(request_id = %request.request_id, "served from cache");
                return Ok(DispatchOutcome::Completed {
                    value,
                    cached: true,
                    backend: None,
                });
            }
        }

        let synchronous = match pattern {
            IntegrationPattern::RealTime => true,
            IntegrationPattern::Hybrid => {
                request.urgent || request.item_count() < self.config.hybrid_sync_threshold
            }
            IntegrationPattern::BulkOnly => false,
        } || request.operation == Operation::Search;

        if synchronous {
            let retry = self
                .config
                .retry
                .with_max_retries(primary.descriptor.max_retries);
            let (value, backend) = self.execute_with_retry(request, pattern, retry).await?;
            Ok(DispatchOutcome::Completed {
                value,
                cached: false,
                backend: Some(backend),
            })
        } else {
            let handle = self.engine.submit(
                &request.target_model,
                request.operation,
                request.split_items(),
            )?;
            debug!(
                request_id = %request.request_id,
                job_id = %handle.job_id,
                "request queued as batch job"
            );
            Ok(DispatchOutcome::Queued(handle))
        }
    }

    // ── Synchronous path ─────────────────────────────────────────────────────

    async fn execute_with_retry(
        &self,
        request: &GatewayRequest,
        pattern: IntegrationPattern,
        retry: RetryPolicy,
    ) -> GatewayResult<(Value, String)> {
        let mut last_error: Option<GatewayError> = None;
        for attempt in 0..=retry.max_retries {
            if attempt > 0 {
                tokio::time::sleep(retry.delay(attempt - 1)).await;
            }
            match self.execute_once(request, pattern).await {
                Ok(result) => return Ok(result),
                Err(err) if err.is_retryable() => {
                    warn!(
                        request_id = %request.request_id,
                        attempt,
                        error = %err,
                        "synchronous dispatch attempt failed"
                    );
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }
        Err(last_error.unwrap_or_else(|| GatewayError::Unavailable {
            model: request.target_model.clone(),
            pattern,
        }))
    }

    async fn execute_once(
        &self,
        request: &GatewayRequest,
        pattern: IntegrationPattern,
    ) -> GatewayResult<(Value, String)> {
        let backend = self
            .router
            .select_backend(pattern, &request.target_model)?;
        let name = backend.descriptor.name.clone();
        let _guard = self.router.begin_dispatch(&name);

        let mut value = match request.operation {
            Operation::Embed => self.do_embed(&backend, request).await?,
            Operation::Search => self.do_search(&backend, request).await?,
            Operation::Upsert => self.do_upsert(&backend, request).await?,
            Operation::Delete => self.do_delete(&backend, request).await?,
        };

        if let Some(enricher) = &self.enricher {
            if let Err(err) = enricher.enrich(&backend.descriptor, &mut value).await {
                warn!(
                    request_id = %request.request_id,
                    error = %err,
                    "enrichment failed, returning unenriched result"
                );
            }
        }

        if request.operation.is_cacheable() {
            let ttl = match request.operation {
                Operation::Search => self.config.search_ttl,
                _ => self.config.embed_ttl,
            };
            self.cache.put(
                request.operation,
                &request.target_model,
                &request.payload,
                value.clone(),
                ttl,
            );
        }
        Ok((value, name))
    }

    // ── Per-operation execution ──────────────────────────────────────────────

    async fn do_embed(
        &self,
        backend: &BackendSnapshot,
        request: &GatewayRequest,
    ) -> GatewayResult<Value> {
        let descriptor = &backend.descriptor;
        let payload = &request.payload;

        let (inputs, single) = if let Some(items) = payload.get("items").and_then(Value::as_array) {
            (items.iter().map(embed_input).collect::<Vec<_>>(), false)
        } else if let Some(text) = payload.get("text").and_then(Value::as_str) {
            (vec![Value::String(text.to_string())], true)
        } else {
            return Err(GatewayError::Validation(
                "embed payload requires 'text' or 'items'".into(),
            ));
        };

        let embeddings = self.bounded_embed(descriptor, &inputs).await?;
        if let Some(first) = embeddings.first() {
            if first.len() != descriptor.dimension {
                warn!(
                    backend = %descriptor.name,
                    expected = descriptor.dimension,
                    got = first.len(),
                    "embedding width differs from configured dimension"
                );
            }
        }

        if single {
            let embedding = embeddings.into_iter().next().ok_or_else(|| {
                GatewayError::Backend {
                    backend: descriptor.name.clone(),
                    message: "backend returned no embeddings".into(),
                }
            })?;
            Ok(json!({
                "model": request.target_model,
                "dimension": descriptor.dimension,
                "embedding": embedding,
            }))
        } else {
            Ok(json!({
                "model": request.target_model,
                "dimension": descriptor.dimension,
                "embeddings": embeddings,
            }))
        }
    }

    async fn do_search(
        &self,
        backend: &BackendSnapshot,
        request: &GatewayRequest,
    ) -> GatewayResult<Value> {
        let descriptor = &backend.descriptor;
        let payload = &request.payload;
        let limit = payload
            .get("limit")
            .and_then(Value::as_u64)
            .unwrap_or(10) as usize;

        let vector: Vec<f32> = if let Some(raw) = payload.get("vector").and_then(Value::as_array) {
            raw.iter()
                .map(|v| v.as_f64().map(|f| f as f32))
                .collect::<Option<Vec<f32>>>()
                .ok_or_else(|| {
                    GatewayError::Validation("'vector' must be an array of numbers".into())
                })?
        } else if let Some(text) = payload.get("text").and_then(Value::as_str) {
            // Text queries are embedded through the same backend first.
            let inputs = vec![Value::String(text.to_string())];
            self.bounded_embed(descriptor, &inputs)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| GatewayError::Backend {
                    backend: descriptor.name.clone(),
                    message: "backend returned no embeddings".into(),
                })?
        } else {
            return Err(GatewayError::Validation(
                "search payload requires 'vector' or 'text'".into(),
            ));
        };

        let results = self
            .store
            .search(
                &descriptor.model,
                &vector,
                limit,
                payload.get("filter").filter(|f| !f.is_null()),
            )
            .await?;
        Ok(json!({ "model": request.target_model, "results": results }))
    }

    async fn do_upsert(
        &self,
        backend: &BackendSnapshot,
        request: &GatewayRequest,
    ) -> GatewayResult<Value> {
        let descriptor = &backend.descriptor;
        let items = request.split_items();
        for item in &items {
            validate_item(Operation::Upsert, item)
                .map_err(GatewayError::Validation)?;
        }

        let inputs: Vec<Value> = items.iter().map(embed_input).collect();
        let vectors = self.bounded_embed(descriptor, &inputs).await?;
        let records: Vec<VectorRecord> = items
            .iter()
            .zip(vectors)
            .map(|(item, vector)| VectorRecord {
                id: item_id(item),
                vector,
                payload: item.clone(),
            })
            .collect();

        self.store.upsert(&descriptor.model, &records).await?;
        self.cache.invalidate_model(&request.target_model);
        Ok(json!({ "model": request.target_model, "upserted": records.len() }))
    }

    async fn do_delete(
        &self,
        backend: &BackendSnapshot,
        request: &GatewayRequest,
    ) -> GatewayResult<Value> {
        let ids: Vec<String> = request
            .payload
            .get("ids")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        if ids.is_empty() {
            return Err(GatewayError::Validation(
                "delete payload requires a non-empty 'ids' array".into(),
            ));
        }

        self.store.delete(&backend.descriptor.model, &ids).await?;
        self.cache.invalidate_model(&request.target_model);
        Ok(json!({ "model": request.target_model, "deleted": ids.len() }))
    }

    async fn bounded_embed(
        &self,
        descriptor: &BackendDescriptor,
        inputs: &[Value],
    ) -> GatewayResult<Vec<Vec<f32>>> {
        with_timeout(
            Duration::from_millis(descriptor.timeout_ms),
            descriptor.name.clone(),
            descriptor.timeout_ms,
            self.provider.embed(descriptor, inputs),
        )
        .await
    }
}
