//! Core data types shared across the gateway components.
//!
//! These types are the internal contract between the protocol front-ends,
//! the pattern dispatcher, and the batch job engine. They carry no runtime
//! dependencies beyond `serde`, `uuid`, and `chrono`, so protocol adapters
//! can construct and inspect them without pulling in any component logic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ─────────────────────────────────────────────────────────────────────────────
// Integration pattern
// ─────────────────────────────────────────────────────────────────────────────

/// Policy determining how requests targeting a model are executed.
///
/// This is a closed variant: adding a pattern means extending this enum and
/// the dispatcher's `match`, never scattering per-model conditionals through
/// call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationPattern {
    /// Always dispatched synchronously, bounded by timeout and retries.
    RealTime,
    /// Synchronous when urgent or small, queued otherwise.
    Hybrid,
    /// Never dispatched synchronously; every request becomes a batch job.
    BulkOnly,
}

impl IntegrationPattern {
    /// Stable lowercase name used in cache keys and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            IntegrationPattern::RealTime => "real_time",
            IntegrationPattern::Hybrid => "hybrid",
            IntegrationPattern::BulkOnly => "bulk_only",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Operation
// ─────────────────────────────────────────────────────────────────────────────

/// The gateway-level operation carried by a [`GatewayRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Similarity search against the vector store.
    Search,
    /// Produce embeddings via a backend provider.
    Embed,
    /// Embed (if needed) and write records into the vector store.
    Upsert,
    /// Remove records from the vector store by id.
    Delete,
}

impl Operation {
    /// Only deterministic read-style operations are cached. Upsert/Delete
    /// are never cached and instead invalidate overlapping keys.
    pub fn is_cacheable(&self) -> bool {
        matches!(self, Operation::Search | Operation::Embed)
    }

    /// Stable lowercase name used in cache keys and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Search => "search",
            Operation::Embed => "embed",
            Operation::Upsert => "upsert",
            Operation::Delete => "delete",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// GatewayRequest
// ─────────────────────────────────────────────────────────────────────────────

/// Normalized representation of an inbound call, independent of the protocol
/// front-end that produced it.
///
/// Immutable after construction: front-ends build it once and hand it to the
/// dispatcher, which only reads. The `request_id` exists for correlation and
/// never participates in cache-key derivation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayRequest {
    /// Unique id generated at ingress, used in logs and traces.
    pub request_id: String,
    /// What the caller wants done.
    pub operation: Operation,
    /// Name of the model the request targets.
    pub target_model: String,
    /// Operation-specific data, opaque to the routing layers.
    pub payload: Value,
    /// Urgency hint; only consulted by the Hybrid pattern.
    pub urgent: bool,
    /// When the request entered the gateway.
    pub received_at: DateTime<Utc>,
}

impl GatewayRequest {
    /// Construct a request with a fresh id and the current timestamp.
    pub fn new(operation: Operation, target_model: impl Into<String>, payload: Value) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            operation,
            target_model: target_model.into(),
            payload,
            urgent: false,
            received_at: Utc::now(),
        }
    }

    /// Builder helper: set the urgency hint.
    pub fn with_urgent(mut self, urgent: bool) -> Self {
        self.urgent = urgent;
        self
    }

    /// Number of individual work items implied by the payload.
    ///
    /// A payload with an `items` array counts its elements; anything else is
    /// a single item. The Hybrid pattern compares this against its
    /// synchronous threshold.
    pub fn item_count(&self) -> usize {
        self.payload
            .get("items")
            .and_then(Value::as_array)
            .map(|a| a.len())
            .unwrap_or(1)
    }

    /// Split a multi-item payload 1:1 into batch job items.
    ///
    /// Payloads without an `items` array become a single-item job.
    pub fn split_items(&self) -> Vec<Value> {
        match self.payload.get("items").and_then(Value::as_array) {
            Some(items) => items.clone(),
            None => vec![self.payload.clone()],
        }
    }
}
