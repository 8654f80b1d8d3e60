//! Backend provider client.
//!
//! Each [`BackendDescriptor`] endpoint exposes `embed` and `health` over a
//! network call; the exact wire format is provider-specific and abstracted
//! behind this trait. The shipped [`HttpProviderClient`] speaks a plain JSON
//! dialect; adapters for other providers implement the same trait.

use crate::error::{GatewayError, GatewayResult};
use crate::registry::BackendDescriptor;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, instrument};

/// Client contract for external embedding providers.
///
/// Implementations must isolate their own failures: network and protocol
/// errors come back as [`GatewayError::Backend`] / [`GatewayError::Timeout`],
/// never as panics.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Produce one embedding per input item.
    async fn embed(
        &self,
        backend: &BackendDescriptor,
        inputs: &[Value],
    ) -> GatewayResult<Vec<Vec<f32>>>;

    /// Liveness probe against the backend's health endpoint.
    async fn health(&self, backend: &BackendDescriptor) -> bool;
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// [`ProviderClient`] over HTTP/JSON.
///
/// `POST {endpoint}/embed` with `{"model", "input": [...]}` returning
/// `{"embeddings": [[f32, ...], ...]}`, and `GET {endpoint}/health`.
pub struct HttpProviderClient {
    client: Client,
}

impl Default for HttpProviderClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpProviderClient {
    /// Build the client. Per-request timeouts come from each descriptor, so
    /// the client itself carries no global timeout.
    pub fn new() -> Self {
        let client = Client::builder()
            .build()
            .expect("failed to build reqwest client");
        Self { client }
    }

    fn map_error(backend: &BackendDescriptor, err: reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            GatewayError::Timeout {
                backend: backend.name.clone(),
                timeout_ms: backend.timeout_ms,
            }
        } else {
            GatewayError::Backend {
                backend: backend.name.clone(),
                message: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl ProviderClient for HttpProviderClient {
    #[instrument(skip(self, inputs), fields(backend = %backend.name, items = inputs.len()))]
    async fn embed(
        &self,
        backend: &BackendDescriptor,
        inputs: &[Value],
    ) -> GatewayResult<Vec<Vec<f32>>> {
        let url = format!("{}/embed", backend.endpoint.trim_end_matches('/'));
        debug!(url = %url, "embedding via backend provider");

        let response = self
            .client
            .post(&url)
            .timeout(Duration::from_millis(backend.timeout_ms))
            .json(&json!({ "model": backend.model, "input": inputs }))
            .send()
            .await
            .map_err(|e| Self::map_error(backend, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Backend {
                backend: backend.name.clone(),
                message: format!("HTTP {status}: {body}"),
            });
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| Self::map_error(backend, e))?;

        if parsed.embeddings.len() != inputs.len() {
            return Err(GatewayError::Backend {
                backend: backend.name.clone(),
                message: format!(
                    "expected {} embeddings, got {}",
                    inputs.len(),
                    parsed.embeddings.len()
                ),
            });
        }
        Ok(parsed.embeddings)
    }

    async fn health(&self, backend: &BackendDescriptor) -> bool {
        let url = format!("{}/health", backend.endpoint.trim_end_matches('/'));
        match self.client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }
}
