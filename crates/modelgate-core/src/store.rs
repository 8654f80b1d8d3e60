//! Vector store collaborator.
//!
//! The gateway treats the vector store purely as a service with `search`,
//! `upsert`, `delete`, and `health` operations. Collection schema, indexing
//! parameters, and storage placement are entirely the store's concern.

use crate::error::{GatewayError, GatewayResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, instrument};

/// One record written into a collection. Downstream upserts are idempotent
/// by `id`, which is what makes at-least-once batch reprocessing safe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub vector: Vec<f32>,
    /// Original item payload stored alongside the vector.
    pub payload: Value,
}

/// Query/upsert interface of the external vector database.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Similarity search over a collection.
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        filter: Option<&Value>,
    ) -> GatewayResult<Value>;

    /// Insert or replace records by id.
    async fn upsert(&self, collection: &str, records: &[VectorRecord]) -> GatewayResult<()>;

    /// Remove records by id.
    async fn delete(&self, collection: &str, ids: &[String]) -> GatewayResult<()>;

    /// Liveness probe.
    async fn health(&self) -> bool;
}

/// [`VectorStore`] over HTTP/JSON against a single base URL.
pub struct HttpVectorStore {
    base_url: String,
    client: Client,
}

impl HttpVectorStore {
    /// Store identifier used in error messages.
    const NAME: &'static str = "vector-store";

    /// Build a client for the store at `base_url` with one shared timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build reqwest client");
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    fn map_error(err: reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            GatewayError::Timeout {
                backend: Self::NAME.to_string(),
                timeout_ms: 0,
            }
        } else {
            GatewayError::Backend {
                backend: Self::NAME.to_string(),
                message: err.to_string(),
            }
        }
    }

    async fn post(&self, path: &str, body: Value) -> GatewayResult<Value> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "vector store call");
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(Self::map_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Backend {
                backend: Self::NAME.to_string(),
                message: format!("HTTP {status}: {body}"),
            });
        }
        response.json().await.map_err(Self::map_error)
    }
}

#[async_trait]
impl VectorStore for HttpVectorStore {
    #[instrument(skip(self, vector, filter), fields(collection, limit))]
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        filter: Option<&Value>,
    ) -> GatewayResult<Value> {
        self.post(
            &format!("/collections/{collection}/search"),
            json!({ "vector": vector, "limit": limit, "filter": filter }),
        )
        .await
    }

    async fn upsert(&self, collection: &str, records: &[VectorRecord]) -> GatewayResult<()> {
        self.post(
            &format!("/collections/{collection}/points"),
            json!({ "points": records }),
        )
        .await
        .map(|_| ())
    }

    async fn delete(&self, collection: &str, ids: &[String]) -> GatewayResult<()> {
        self.post(
            &format!("/collections/{collection}/delete"),
            json!({ "ids": ids }),
        )
        .await
        .map(|_| ())
    }

    async fn health(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }
}
