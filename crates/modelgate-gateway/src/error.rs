//! HTTP error mapping.
//!
//! Every front-end returns [`ApiError`]; the `IntoResponse` impl renders a
//! JSON envelope `{"error": {"code", "message", "retryable"}}`. The
//! `retryable` flag is how callers distinguish transient conditions
//! (`UNAVAILABLE`, `TIMEOUT`) from permanent rejections.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use modelgate_core::GatewayError;
use serde_json::json;

/// Gateway-surface error: core failures plus transport-level rejections.
#[derive(Debug)]
pub enum ApiError {
    Core(GatewayError),
    Unauthorized(String),
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        ApiError::Core(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, retryable, message) = match &self {
            ApiError::Unauthorized(reason) => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                false,
                reason.clone(),
            ),
            ApiError::Core(err) => {
                let (status, code, retryable) = match err {
                    GatewayError::Validation(_) => {
                        (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", false)
                    }
                    GatewayError::JobNotFound(_) => (StatusCode::NOT_FOUND, "JOB_NOT_FOUND", false),
                    GatewayError::AlreadyTerminal { .. } => {
                        (StatusCode::CONFLICT, "ALREADY_TERMINAL", false)
                    }
                    GatewayError::Backend { .. } => (StatusCode::BAD_GATEWAY, "BACKEND_ERROR", true),
                    GatewayError::Unavailable { .. } => {
                        (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE", true)
                    }
                    GatewayError::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT", true),
                    GatewayError::Config(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR", false)
                    }
                };
                (status, code, retryable, err.to_string())
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
                "retryable": retryable,
            }
        }));
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
