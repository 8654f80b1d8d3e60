//! Pluggable authorization hook.
//!
//! Every protocol front-end calls [`Authorizer::authorize`] before
//! constructing a `GatewayRequest`. The scheme itself is an extension
//! point; two implementations ship with the gateway: [`AllowAll`] for
//! development and [`ApiKeyAuthorizer`] for static key lists. Keys are
//! accepted from either `Authorization: Bearer <key>` or `X-Api-Key`.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Transport-agnostic view of the inbound call, built by each front-end
/// before normalization.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    /// Header names lowercased.
    pub headers: HashMap<String, String>,
    /// Logical path or surface name, for audit logging.
    pub surface: String,
}

impl AuthContext {
    pub fn new(surface: impl Into<String>) -> Self {
        Self {
            headers: HashMap::new(),
            surface: surface.into(),
        }
    }

    /// Builder helper: attach a header (name is lowercased).
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into().to_lowercase(), value.into());
        self
    }
}

/// Outcome of the authorization hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    Allow {
        /// Identity resolved from the credentials, if any.
        principal: Option<String>,
    },
    Deny {
        reason: String,
    },
}

/// Authorization extension point consulted at every ingress.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self, ctx: &AuthContext) -> AuthDecision;
}

/// Development-mode authorizer: every request is allowed, anonymously.
pub struct AllowAll;

#[async_trait]
impl Authorizer for AllowAll {
    async fn authorize(&self, _ctx: &AuthContext) -> AuthDecision {
        AuthDecision::Allow { principal: None }
    }
}

/// Static API-key authorizer.
pub struct ApiKeyAuthorizer {
    valid_keys: HashSet<String>,
}

impl ApiKeyAuthorizer {
    /// Build the authorizer from a list of valid keys.
    pub fn new(valid_keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            valid_keys: valid_keys.into_iter().map(Into::into).collect(),
        }
    }

    fn extract_key(ctx: &AuthContext) -> Option<String> {
        if let Some(key) = ctx.headers.get("x-api-key") {
            return Some(key.clone());
        }
        if let Some(key) = ctx
            .headers
            .get("authorization")
            .and_then(|auth| auth.strip_prefix("Bearer "))
        {
            return Some(key.to_string());
        }
        None
    }
}

#[async_trait]
impl Authorizer for ApiKeyAuthorizer {
    async fn authorize(&self, ctx: &AuthContext) -> AuthDecision {
        match Self::extract_key(ctx) {
            Some(key) if self.valid_keys.contains(&key) => AuthDecision::Allow {
                principal: Some(key),
            },
            Some(_) => {
                warn!(surface = %ctx.surface, "rejected request: invalid API key");
                AuthDecision::Deny {
                    reason: "invalid API key".to_string(),
                }
            }
            None => {
                warn!(surface = %ctx.surface, "rejected request: missing API key");
                AuthDecision::Deny {
                    reason: "missing authentication credentials".to_string(),
                }
            }
        }
    }
}
