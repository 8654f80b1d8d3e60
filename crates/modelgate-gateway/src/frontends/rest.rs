//! Request/response REST front-end.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/v1/search` | Similarity search, served from cache when possible. |
//! | `POST` | `/v1/embed`  | Synchronous embedding or queued job, per pattern. |
//! | `POST` | `/v1/upsert` | Embed-and-store records. |
//! | `POST` | `/v1/delete` | Remove records by id. |
//! | `GET`  | `/v1/jobs/{job_id}` | Batch job snapshot. |
//! | `DELETE` | `/v1/jobs/{job_id}` | Request cancellation. |

use super::{authorize, outcome_response};
use crate::error::ApiResult;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::HeaderMap,
    response::Response,
};
use modelgate_core::{GatewayRequest, Operation};
use serde::Deserialize;
use serde_json::{Value, json};

fn default_limit() -> usize {
    10
}

#[derive(Debug, Deserialize)]
pub struct SearchBody {
    pub model: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub vector: Option<Vec<f32>>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub filter: Option<Value>,
}

/// `POST /v1/search`
pub async fn search(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SearchBody>,
) -> ApiResult<Response> {
    authorize(&state, &headers, "/v1/search").await?;
    // Absent fields stay absent: the cache key hashes the payload, so a
    // search built here must normalize to the same shape the other
    // surfaces produce.
    let mut payload = serde_json::Map::new();
    if let Some(text) = body.text {
        payload.insert("text".to_string(), json!(text));
    }
    if let Some(vector) = body.vector {
        payload.insert("vector".to_string(), json!(vector));
    }
    payload.insert("limit".to_string(), json!(body.limit));
    if let Some(filter) = body.filter {
        payload.insert("filter".to_string(), filter);
    }
    let request = GatewayRequest::new(Operation::Search, body.model, Value::Object(payload));
    let outcome = state.dispatcher.dispatch(&request).await?;
    Ok(outcome_response(outcome))
}

#[derive(Debug, Deserialize)]
pub struct EmbedBody {
    pub model: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub items: Option<Vec<Value>>,
    #[serde(default)]
    pub urgent: bool,
}

/// `POST /v1/embed`
pub async fn embed(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<EmbedBody>,
) -> ApiResult<Response> {
    authorize(&state, &headers, "/v1/embed").await?;
    let payload = match (&body.items, &body.text) {
        (Some(items), _) => json!({ "items": items }),
        (None, Some(text)) => json!({ "text": text }),
        (None, None) => json!({}),
    };
    let request =
        GatewayRequest::new(Operation::Embed, body.model, payload).with_urgent(body.urgent);
    let outcome = state.dispatcher.dispatch(&request).await?;
    Ok(outcome_response(outcome))
}

#[derive(Debug, Deserialize)]
pub struct UpsertBody {
    pub model: String,
    pub items: Vec<Value>,
    #[serde(default)]
    pub urgent: bool,
}

/// `POST /v1/upsert`
pub async fn upsert(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<UpsertBody>,
) -> ApiResult<Response> {
    authorize(&state, &headers, "/v1/upsert").await?;
    let request = GatewayRequest::new(
        Operation::Upsert,
        body.model,
        json!({ "items": body.items }),
    )
    .with_urgent(body.urgent);
    let outcome = state.dispatcher.dispatch(&request).await?;
    Ok(outcome_response(outcome))
}

#[derive(Debug, Deserialize)]
pub struct DeleteBody {
    pub model: String,
    pub ids: Vec<String>,
}

/// `POST /v1/delete`
pub async fn delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<DeleteBody>,
) -> ApiResult<Response> {
    authorize(&state, &headers, "/v1/delete").await?;
    let request = GatewayRequest::new(Operation::Delete, body.model, json!({ "ids": body.ids }));
    let outcome = state.dispatcher.dispatch(&request).await?;
    Ok(outcome_response(outcome))
}

/// `GET /v1/jobs/{job_id}`
pub async fn job_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(job_id): Path<String>,
) -> ApiResult<Json<modelgate_core::BatchJob>> {
    authorize(&state, &headers, "/v1/jobs").await?;
    Ok(Json(state.engine.status(&job_id)?))
}

/// `DELETE /v1/jobs/{job_id}` — cooperative cancellation request.
pub async fn cancel_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(job_id): Path<String>,
) -> ApiResult<Json<Value>> {
    authorize(&state, &headers, "/v1/jobs").await?;
    let status = state.engine.cancel(&job_id)?;
    Ok(Json(json!({ "job_id": job_id, "status": status })))
}
