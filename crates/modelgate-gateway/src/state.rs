//! Shared application state injected into every handler.

use modelgate_core::{Authorizer, BackendRegistry, BatchEngine, PatternDispatcher, ResponseCache};
use std::sync::Arc;

/// Everything a front-end needs, behind `Arc`s so axum can clone freely.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<PatternDispatcher>,
    pub engine: Arc<BatchEngine>,
    pub registry: Arc<BackendRegistry>,
    pub cache: Arc<ResponseCache>,
    pub authorizer: Arc<dyn Authorizer>,
}
