//! `modelgate-core` — unified model-integration gateway core.
//!
//! This crate holds every component between a normalized
//! [`GatewayRequest`](types::GatewayRequest) and the external
//! collaborators (model providers and the vector store):
//!
//! | Component | Module |
//! |-----------|--------|
//! | Backend registry | [`registry`] |
//! | Response cache | [`cache`] |
//! | Request router / load balancer | [`router`] |
//! | Health checker | [`health`] |
//! | Pattern dispatcher | [`dispatch`] |
//! | Batch job engine | [`batch`] |
//! | Authorization hook | [`auth`] |
//! | Provider / vector-store clients | [`provider`], [`store`] |
//!
//! Protocol front-ends live in `modelgate-gateway`; they build a
//! `GatewayRequest` and call
//! [`PatternDispatcher::dispatch`](dispatch::PatternDispatcher::dispatch),
//! which consults the cache, resolves the target model's integration
//! pattern, and either executes synchronously through the router or
//! enqueues a batch job.

pub mod auth;
pub mod batch;
pub mod cache;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod health;
pub mod provider;
pub mod registry;
pub mod retry;
pub mod router;
pub mod store;
pub mod types;

pub use auth::{AllowAll, ApiKeyAuthorizer, AuthContext, AuthDecision, Authorizer};
pub use batch::{
    BatchEngine, BatchEngineConfig, BatchJob, ItemFailure, JobHandle, JobProgress, JobStatus,
    QueueStats,
};
pub use cache::{CacheStats, ResponseCache};
pub use config::GatewayConfig;
pub use dispatch::{DispatchOutcome, DispatcherConfig, Enricher, PatternDispatcher};
pub use error::{GatewayError, GatewayResult};
pub use health::{HealthChecker, HealthCheckerConfig};
pub use provider::{HttpProviderClient, ProviderClient};
pub use registry::{BackendDescriptor, BackendRegistry, BackendSnapshot};
pub use retry::RetryPolicy;
pub use router::{DispatchGuard, RouteStrategy, Router};
pub use store::{HttpVectorStore, VectorRecord, VectorStore};
pub use types::{GatewayRequest, IntegrationPattern, Operation};
