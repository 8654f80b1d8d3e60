//! End-to-end HTTP surface tests against in-process doubles.

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use modelgate_core::{
    BackendDescriptor, GatewayConfig, GatewayResult, IntegrationPattern, ProviderClient,
    VectorRecord, VectorStore,
};
use modelgate_gateway::{AppState, GatewayServer};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

struct StubProvider;

#[async_trait]
impl ProviderClient for StubProvider {
    async fn embed(
        &self,
        backend: &BackendDescriptor,
        inputs: &[Value],
    ) -> GatewayResult<Vec<Vec<f32>>> {
        Ok(vec![vec![0.5; backend.dimension]; inputs.len()])
    }

    async fn health(&self, _backend: &BackendDescriptor) -> bool {
        true
    }
}

struct StubStore;

#[async_trait]
impl VectorStore for StubStore {
    async fn search(
        &self,
        collection: &str,
        _vector: &[f32],
        limit: usize,
        _filter: Option<&Value>,
    ) -> GatewayResult<Value> {
        Ok(json!([{ "id": format!("{collection}-hit"), "score": 0.9, "limit": limit }]))
    }

    async fn upsert(&self, _collection: &str, _records: &[VectorRecord]) -> GatewayResult<()> {
        Ok(())
    }

    async fn delete(&self, _collection: &str, _ids: &[String]) -> GatewayResult<()> {
        Ok(())
    }

    async fn health(&self) -> bool {
        true
    }
}

fn config(api_keys: Vec<String>) -> GatewayConfig {
    GatewayConfig {
        backends: vec![
            BackendDescriptor::new("minilm-a", IntegrationPattern::RealTime, "http://stub")
                .with_model("minilm")
                .with_dimension(4),
            BackendDescriptor::new("mixtral-a", IntegrationPattern::BulkOnly, "http://stub")
                .with_model("mixtral")
                .with_dimension(4),
        ],
        api_keys,
        ..Default::default()
    }
}

fn app(api_keys: Vec<String>) -> (Router, AppState) {
    GatewayServer::new(config(api_keys))
        .build_app_with(Arc::new(StubProvider), Arc::new(StubStore))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post(path: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_reports_backends_and_queue() {
    let (app, _) = app(vec![]);
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["backends"].as_array().unwrap().len(), 2);
    assert_eq!(body["queue"]["depth"], 0);
}

#[tokio::test]
async fn search_returns_results_with_backend_attribution() {
    let (app, _) = app(vec![]);
    let response = app
        .oneshot(post(
            "/v1/search",
            json!({ "model": "minilm", "text": "hello", "limit": 3 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["model"], "minilm");
    assert_eq!(body["cached"], false);
    assert_eq!(body["backend"], "minilm-a");
    assert!(body["results"].is_array());
}

#[tokio::test]
async fn repeated_search_is_served_from_cache() {
    let (app, _) = app(vec![]);
    let request = || post("/v1/search", json!({ "model": "minilm", "text": "hello" }));

    let first = body_json(app.clone().oneshot(request()).await.unwrap()).await;
    assert_eq!(first["cached"], false);

    let second = body_json(app.oneshot(request()).await.unwrap()).await;
    assert_eq!(second["cached"], true);
    assert!(second["backend"].is_null() || second.get("backend").is_none());
}

#[tokio::test]
async fn embed_on_realtime_model_is_synchronous() {
    let (app, _) = app(vec![]);
    let response = app
        .oneshot(post("/v1/embed", json!({ "model": "minilm", "text": "x" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["embedding"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn embed_on_bulk_model_is_queued_with_job_lifecycle() {
    let (app, _state) = app(vec![]);
    let items: Vec<Value> = (0..5).map(|i| json!({ "text": format!("t{i}") })).collect();
    let response = app
        .clone()
        .oneshot(post("/v1/embed", json!({ "model": "mixtral", "items": items })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let body = body_json(response).await;
    let job_id = body["job_id"].as_str().unwrap().to_string();
    assert_eq!(body["status"], "queued");

    // Status is visible before any worker runs.
    let status_response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/v1/jobs/{job_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(status_response.status(), StatusCode::OK);
    let status_body = body_json(status_response).await;
    assert_eq!(status_body["status"], "pending");
    assert_eq!(status_body["progress"]["total"], 5);

    // Cancel while still pending.
    let cancel_response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/v1/jobs/{job_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(cancel_response.status(), StatusCode::OK);
    let cancel_body = body_json(cancel_response).await;
    assert_eq!(cancel_body["status"], "cancelled");

    // A second cancel conflicts.
    let again = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/v1/jobs/{job_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(again.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn unknown_model_maps_to_bad_request() {
    let (app, _) = app(vec![]);
    let response = app
        .oneshot(post("/v1/embed", json!({ "model": "nope", "text": "x" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["retryable"], false);
}

#[tokio::test]
async fn missing_job_maps_to_not_found() {
    let (app, _) = app(vec![]);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/v1/jobs/job-does-not-exist")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn query_surface_runs_searches() {
    let (app, _) = app(vec![]);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/v1/query?model=minilm&text=hello&limit=2")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["model"], "minilm");
    assert!(body["results"].is_array());
}

#[tokio::test]
async fn rest_and_query_surfaces_share_cache_entries() {
    let (app, _) = app(vec![]);

    let first = app
        .clone()
        .oneshot(post(
            "/v1/search",
            json!({ "model": "minilm", "text": "hello", "limit": 2 }),
        ))
        .await
        .unwrap();
    assert_eq!(body_json(first).await["cached"], false);

    // The same logical search through the query surface hits the entry
    // the REST call populated.
    let second = app
        .oneshot(
            Request::builder()
                .uri("/v1/query?model=minilm&text=hello&limit=2")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(body_json(second).await["cached"], true);
}

#[tokio::test]
async fn api_key_is_enforced_when_configured() {
    let (app, _) = app(vec!["secret-key".into()]);

    let denied = app
        .clone()
        .oneshot(post("/v1/search", json!({ "model": "minilm", "text": "x" })))
        .await
        .unwrap();
    assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

    let allowed = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/search")
                .header(header::CONTENT_TYPE, "application/json")
                .header("x-api-key", "secret-key")
                .body(Body::from(
                    json!({ "model": "minilm", "text": "x" }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(allowed.status(), StatusCode::OK);
}

#[tokio::test]
async fn upsert_synchronous_path_reports_count() {
    let (app, _) = app(vec![]);
    let response = app
        .oneshot(post(
            "/v1/upsert",
            json!({
                "model": "minilm",
                "items": [{ "id": "a", "text": "alpha" }, { "id": "b", "text": "beta" }],
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["upserted"], 2);
}

#[tokio::test]
async fn delete_requires_ids() {
    let (app, _) = app(vec![]);
    let response = app
        .clone()
        .oneshot(post("/v1/delete", json!({ "model": "minilm", "ids": [] })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(post("/v1/delete", json!({ "model": "minilm", "ids": ["a"] })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["deleted"], 1);
}
