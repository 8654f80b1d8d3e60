//! WebSocket front-end.
//!
//! Long-lived connections send one JSON envelope per frame:
//!
//! ```json
//! {"operation": "search", "model": "minilm", "payload": {"text": "..."}, "urgent": false}
//! ```
//!
//! Each frame gets exactly one reply frame carrying the same `request_id`
//! the gateway assigned, so callers can pipeline frames without waiting.
//! Errors are per-frame; a malformed envelope never tears down the socket.

use super::authorize;
use crate::error::ApiResult;
use crate::state::AppState;
use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::HeaderMap,
    response::Response,
};
use modelgate_core::{DispatchOutcome, GatewayRequest, Operation};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct FrameEnvelope {
    operation: Operation,
    model: String,
    #[serde(default)]
    payload: Value,
    #[serde(default)]
    urgent: bool,
}

/// `GET /v1/stream` — authorization runs against the upgrade request's
/// headers, before the protocol switch.
pub async fn stream(
    State(state): State<AppState>,
    headers: HeaderMap,
    upgrade: WebSocketUpgrade,
) -> ApiResult<Response> {
    authorize(&state, &headers, "/v1/stream").await?;
    Ok(upgrade.on_upgrade(move |socket| handle_socket(socket, state)))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    debug!("websocket session opened");
    while let Some(frame) = socket.recv().await {
        let message = match frame {
            Ok(message) => message,
            Err(err) => {
                debug!(error = %err, "websocket receive error, closing session");
                break;
            }
        };
        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => break,
            // Pings are answered by the protocol layer.
            _ => continue,
        };

        let reply = handle_frame(&state, text.as_str()).await;
        let serialized = match serde_json::to_string(&reply) {
            Ok(serialized) => serialized,
            Err(err) => {
                warn!(error = %err, "failed to serialize websocket reply");
                continue;
            }
        };
        if socket.send(Message::Text(serialized.into())).await.is_err() {
            break;
        }
    }
    debug!("websocket session closed");
}

/// One envelope in, one reply value out. Parse failures and dispatch
/// failures both become `{"ok": false, "error": ...}` replies.
async fn handle_frame(state: &AppState, text: &str) -> Value {
    let envelope: FrameEnvelope = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(err) => {
            return json!({
                "ok": false,
                "error": { "code": "VALIDATION_ERROR", "message": format!("malformed frame: {err}") },
            });
        }
    };

    let request = GatewayRequest::new(envelope.operation, envelope.model, envelope.payload)
        .with_urgent(envelope.urgent);
    let request_id = request.request_id.clone();

    match state.dispatcher.dispatch(&request).await {
        Ok(DispatchOutcome::Completed {
            value,
            cached,
            backend,
        }) => json!({
            "request_id": request_id,
            "ok": true,
            "cached": cached,
            "backend": backend,
            "result": value,
        }),
        Ok(DispatchOutcome::Queued(handle)) => json!({
            "request_id": request_id,
            "ok": true,
            "queued": true,
            "job_id": handle.job_id,
        }),
        Err(err) => json!({
            "request_id": request_id,
            "ok": false,
            "error": { "code": error_code(&err), "message": err.to_string(), "retryable": err.is_retryable() },
        }),
    }
}

fn error_code(err: &modelgate_core::GatewayError) -> &'static str {
    use modelgate_core::GatewayError::*;
    match err {
        Validation(_) => "VALIDATION_ERROR",
        Unavailable { .. } => "UNAVAILABLE",
        Backend { .. } => "BACKEND_ERROR",
        Timeout { .. } => "TIMEOUT",
        Config(_) => "CONFIG_ERROR",
        JobNotFound(_) => "JOB_NOT_FOUND",
        AlreadyTerminal { .. } => "ALREADY_TERMINAL",
    }
}
