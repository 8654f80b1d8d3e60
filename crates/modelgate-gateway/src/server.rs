//! Axum-based HTTP gateway server.
//!
//! [`GatewayServer`] wires the registry, router, cache, batch engine, and
//! dispatcher into a running axum service.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Aggregate health, queue and cache stats. |
//! | `POST` | `/v1/search` | Similarity search. |
//! | `POST` | `/v1/embed` | Embedding (synchronous or queued). |
//! | `POST` | `/v1/upsert` | Embed-and-store. |
//! | `POST` | `/v1/delete` | Delete by id. |
//! | `GET`  | `/v1/jobs/{job_id}` | Batch job status. |
//! | `DELETE` | `/v1/jobs/{job_id}` | Cancel a batch job. |
//! | `GET`  | `/v1/query` | Query-string search surface. |
//! | `GET`  | `/v1/stream` | WebSocket surface. |

use crate::frontends::{query, rest, stream};
use crate::handlers::health as health_handlers;
use crate::state::AppState;
use axum::{
    Router,
    routing::{delete, get, post},
};
use modelgate_core::{
    AllowAll, ApiKeyAuthorizer, Authorizer, BackendRegistry, BatchEngine, BatchEngineConfig,
    DispatcherConfig, GatewayConfig, GatewayResult, HealthChecker, HealthCheckerConfig,
    HttpProviderClient, HttpVectorStore, PatternDispatcher, ProviderClient, ResponseCache,
    RetryPolicy, VectorStore,
    router::Router as BackendRouter,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

/// High-level gateway server encapsulating the full component stack.
pub struct GatewayServer {
    config: GatewayConfig,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig) -> Self {
        Self { config }
    }

    /// Build the axum [`Router`] over HTTP clients for the providers and the
    /// vector store. Validates the config and registers all backends; call
    /// [`start()`](Self::start) to bind and serve.
    pub fn build_app(&self) -> GatewayResult<(Router, AppState)> {
        let provider = Arc::new(HttpProviderClient::new());
        let store = Arc::new(HttpVectorStore::new(
            &self.config.vector_store_url,
            Duration::from_secs(self.config.vector_store_timeout_secs),
        ));
        self.build_app_with(provider, store)
    }

    /// Same wiring with caller-supplied provider and store implementations.
    pub fn build_app_with(
        &self,
        provider: Arc<dyn ProviderClient>,
        store: Arc<dyn VectorStore>,
    ) -> GatewayResult<(Router, AppState)> {
        self.config.validate()?;

        let registry = Arc::new(BackendRegistry::new());
        for backend in &self.config.backends {
            registry.register(backend.clone())?;
        }

        let router = Arc::new(BackendRouter::new(
            Arc::clone(&registry),
            self.config.strategy,
        ));
        let cache = Arc::new(ResponseCache::new());

        let engine = Arc::new(BatchEngine::new(
            Arc::clone(&registry),
            Arc::clone(&router),
            Arc::clone(&provider),
            Arc::clone(&store),
            Arc::clone(&cache),
            BatchEngineConfig {
                workers: self.config.workers,
                sub_batch_size: self.config.sub_batch_size,
                ..Default::default()
            },
        ));

        let dispatcher = Arc::new(PatternDispatcher::new(
            Arc::clone(&registry),
            Arc::clone(&router),
            Arc::clone(&cache),
            Arc::clone(&engine),
            Arc::clone(&provider),
            Arc::clone(&store),
            None,
            DispatcherConfig {
                hybrid_sync_threshold: self.config.hybrid_sync_threshold,
                retry: RetryPolicy::default(),
                search_ttl: Duration::from_secs(self.config.search_ttl_secs),
                embed_ttl: Duration::from_secs(self.config.embed_ttl_secs),
            },
        ));

        let authorizer: Arc<dyn Authorizer> = if self.config.api_keys.is_empty() {
            warn!("no API keys configured, authentication is disabled");
            Arc::new(AllowAll)
        } else {
            Arc::new(ApiKeyAuthorizer::new(self.config.api_keys.clone()))
        };

        let state = AppState {
            dispatcher,
            engine,
            registry,
            cache,
            authorizer,
        };

        let app = Router::new()
            .route("/health", get(health_handlers::health))
            .route("/v1/search", post(rest::search))
            .route("/v1/embed", post(rest::embed))
            .route("/v1/upsert", post(rest::upsert))
            .route("/v1/delete", post(rest::delete))
            .route("/v1/jobs/{job_id}", get(rest::job_status))
            .route("/v1/jobs/{job_id}", delete(rest::cancel_job))
            .route("/v1/query", get(query::query))
            .route("/v1/stream", get(stream::stream))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(state.clone());

        Ok((app, state))
    }

    /// Spawn the background machinery: interrupted-job recovery, the batch
    /// worker pool, the periodic health checker, and the cache sweeper.
    pub fn spawn_background(
        &self,
        state: &AppState,
        provider: Arc<dyn ProviderClient>,
    ) {
        let recovered = state.engine.recover_interrupted();
        if recovered > 0 {
            info!(recovered, "requeued interrupted batch jobs");
        }
        state.engine.spawn_workers();

        HealthChecker::new(
            Arc::clone(&state.registry),
            provider,
            HealthCheckerConfig {
                interval: Duration::from_secs(self.config.health_interval_secs),
                timeout: Duration::from_secs(self.config.health_timeout_secs),
                fail_threshold: self.config.health_fail_threshold,
            },
        )
        .spawn();

        state
            .cache
            .spawn_sweeper(Duration::from_secs(self.config.cache_sweep_secs));
    }

    /// Bind to `0.0.0.0:{port}` and serve until the process exits.
    pub async fn start(self) -> GatewayResult<()> {
        let provider: Arc<dyn ProviderClient> = Arc::new(HttpProviderClient::new());
        let store: Arc<dyn VectorStore> = Arc::new(HttpVectorStore::new(
            &self.config.vector_store_url,
            Duration::from_secs(self.config.vector_store_timeout_secs),
        ));
        let (app, state) = self.build_app_with(Arc::clone(&provider), store)?;
        self.spawn_background(&state, provider);

        let addr = format!("0.0.0.0:{}", self.config.port);
        info!(
            addr = %addr,
            backends = self.config.backends.len(),
            strategy = ?self.config.strategy,
            "model-integration gateway starting"
        );
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| modelgate_core::GatewayError::Config(format!("bind {addr}: {e}")))?;
        axum::serve(listener, app)
            .await
            .map_err(|e| modelgate_core::GatewayError::Config(format!("server error: {e}")))
    }
}
