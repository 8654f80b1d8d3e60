//! Query-string front-end.
//!
//! A minimal GET surface for callers that cannot POST JSON (curl one-liners,
//! health dashboards, legacy integrations). Only the search operation is
//! exposed here; mutations stay on the REST surface.

use super::{authorize, outcome_response};
use crate::error::ApiResult;
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::Response,
};
use modelgate_core::{GatewayRequest, Operation};
use serde::Deserialize;
use serde_json::json;

fn default_limit() -> usize {
    10
}

#[derive(Debug, Deserialize)]
pub struct QueryParams {
    pub model: String,
    pub text: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub urgent: bool,
}

/// `GET /v1/query?model=...&text=...&limit=...`
pub async fn query(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<QueryParams>,
) -> ApiResult<Response> {
    authorize(&state, &headers, "/v1/query").await?;
    let payload = json!({ "text": params.text, "limit": params.limit });
    let request = GatewayRequest::new(Operation::Search, params.model, payload)
        .with_urgent(params.urgent);
    let outcome = state.dispatcher.dispatch(&request).await?;
    Ok(outcome_response(outcome))
}
