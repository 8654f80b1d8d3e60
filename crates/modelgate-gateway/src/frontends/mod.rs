//! Protocol front-ends.
//!
//! Each front-end is a stateless adapter: parse the inbound payload, run
//! the authorization hook, build a [`GatewayRequest`], call the pattern
//! dispatcher, and serialize the outcome back in its native shape. They
//! share no state and differ only in (de)serialization and error mapping,
//! so new protocols are added by writing another adapter against the same
//! internal contract.

pub mod query;
pub mod rest;
pub mod stream;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::{
    Json,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use modelgate_core::{AuthContext, AuthDecision, DispatchOutcome};
use serde_json::json;

/// Run the pluggable authorization hook before any request is built.
pub(crate) async fn authorize(
    state: &AppState,
    headers: &HeaderMap,
    surface: &str,
) -> ApiResult<()> {
    let mut ctx = AuthContext::new(surface);
    for (name, value) in headers {
        if let Ok(v) = value.to_str() {
            ctx = ctx.with_header(name.as_str(), v);
        }
    }
    match state.authorizer.authorize(&ctx).await {
        AuthDecision::Allow { .. } => Ok(()),
        AuthDecision::Deny { reason } => Err(ApiError::Unauthorized(reason)),
    }
}

/// Serialize a dispatch outcome in the REST/query shape: synchronous
/// results carry a `cached` indicator and the serving backend; queued
/// submissions return `202 Accepted` with the job handle.
pub(crate) fn outcome_response(outcome: DispatchOutcome) -> Response {
    match outcome {
        DispatchOutcome::Completed {
            mut value,
            cached,
            backend,
        } => {
            if let Some(object) = value.as_object_mut() {
                object.insert("cached".to_string(), json!(cached));
                if let Some(backend) = backend {
                    object.insert("backend".to_string(), json!(backend));
                }
            }
            Json(value).into_response()
        }
        DispatchOutcome::Queued(handle) => (
            StatusCode::ACCEPTED,
            Json(json!({ "job_id": handle.job_id, "status": "queued" })),
        )
            .into_response(),
    }
}
