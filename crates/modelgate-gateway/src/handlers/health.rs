//! Aggregate health endpoint.

use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use serde_json::{Value, json};

/// `GET /health` — overall status plus per-backend, queue, and cache views.
///
/// Returns `200` when at least one backend is healthy, `503` otherwise, so
/// load balancers can gate on the status code alone.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let backends = state.registry.list_all();
    let healthy = backends.iter().filter(|b| b.healthy).count();
    let status = if healthy > 0 { "ok" } else { "degraded" };
    let code = if healthy > 0 {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let backend_views: Vec<Value> = backends
        .iter()
        .map(|b| {
            json!({
                "name": b.descriptor.name,
                "model": b.descriptor.model,
                "pattern": b.descriptor.pattern,
                "healthy": b.healthy,
                "active_connections": b.active_connections,
            })
        })
        .collect();

    let queue = state.engine.queue_stats();
    let cache = state.cache.stats();

    let body = json!({
        "status": status,
        "backends": backend_views,
        "queue": {
            "depth": queue.queue_depth,
            "active_workers": queue.active_workers,
            "per_model_backlog": queue.per_model_backlog,
        },
        "cache": {
            "entries": cache.entries,
            "hits": cache.hits,
            "misses": cache.misses,
        },
    });
    (code, Json(body))
}
