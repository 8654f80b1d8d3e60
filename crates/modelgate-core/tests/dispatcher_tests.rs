//! End-to-end dispatcher scenarios against mock collaborators.

mod common;

use common::{MockProvider, MockStore};
use modelgate_core::{
    BackendDescriptor, BackendRegistry, BatchEngine, BatchEngineConfig, DispatchOutcome,
    DispatcherConfig, GatewayError, GatewayRequest, IntegrationPattern, JobStatus, Operation,
    PatternDispatcher, ResponseCache, RetryPolicy, RouteStrategy, Router,
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

struct Harness {
    dispatcher: Arc<PatternDispatcher>,
    engine: Arc<BatchEngine>,
    registry: Arc<BackendRegistry>,
    provider: Arc<MockProvider>,
    store: Arc<MockStore>,
}

/// Retry curve tightened so failure-path tests finish quickly.
fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 3,
        base: Duration::from_millis(1),
        cap: Duration::from_millis(5),
    }
}

fn harness(backends: Vec<BackendDescriptor>, provider: MockProvider) -> Harness {
    let registry = Arc::new(BackendRegistry::new());
    for backend in backends {
        registry.register(backend).unwrap();
    }
    let router = Arc::new(Router::new(
        Arc::clone(&registry),
        RouteStrategy::WeightedRandom,
    ));
    let cache = Arc::new(ResponseCache::new());
    let provider = Arc::new(provider);
    let store = Arc::new(MockStore::new());
    let engine = Arc::new(BatchEngine::new(
        Arc::clone(&registry),
        Arc::clone(&router),
        provider.clone() as Arc<dyn modelgate_core::ProviderClient>,
        store.clone() as Arc<dyn modelgate_core::VectorStore>,
        Arc::clone(&cache),
        BatchEngineConfig {
            retry: fast_retry(),
            idle_poll: Duration::from_millis(20),
            ..Default::default()
        },
    ));
    let dispatcher = Arc::new(PatternDispatcher::new(
        Arc::clone(&registry),
        router,
        cache,
        Arc::clone(&engine),
        provider.clone() as Arc<dyn modelgate_core::ProviderClient>,
        store.clone() as Arc<dyn modelgate_core::VectorStore>,
        None,
        DispatcherConfig {
            retry: fast_retry(),
            ..Default::default()
        },
    ));
    Harness {
        dispatcher,
        engine,
        registry,
        provider,
        store,
    }
}

fn realtime(name: &str) -> BackendDescriptor {
    BackendDescriptor::new(name, IntegrationPattern::RealTime, "http://localhost:9001")
        .with_dimension(4)
        .with_max_retries(2)
}

async fn wait_terminal(harness: &Harness, job_id: &str) -> modelgate_core::BatchJob {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    let mut last_attempted = 0;
    loop {
        let job = harness.engine.status(job_id).unwrap();
        let attempted = job.progress.processed + job.progress.failed;
        assert!(attempted >= last_attempted, "progress went backwards");
        assert!(attempted <= job.progress.total);
        last_attempted = attempted;
        if job.status.is_terminal() {
            return job;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "job {job_id} never reached a terminal state"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn realtime_embed_succeeds_then_hits_cache() {
    let harness = harness(vec![realtime("phi3")], MockProvider::new());
    let payload = json!({ "text": "hello" });

    let first = harness
        .dispatcher
        .dispatch(&GatewayRequest::new(Operation::Embed, "phi3", payload.clone()).with_urgent(true))
        .await
        .unwrap();
    let DispatchOutcome::Completed { value, cached, backend } = first else {
        panic!("expected synchronous completion");
    };
    assert!(!cached);
    assert_eq!(backend.as_deref(), Some("phi3"));
    assert_eq!(value["embedding"].as_array().unwrap().len(), 4);

    // A logically identical request (fresh request id) is served from cache.
    let second = harness
        .dispatcher
        .dispatch(&GatewayRequest::new(Operation::Embed, "phi3", payload))
        .await
        .unwrap();
    let DispatchOutcome::Completed { cached, backend, .. } = second else {
        panic!("expected synchronous completion");
    };
    assert!(cached);
    assert_eq!(backend, None);
    assert_eq!(harness.provider.embed_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unknown_model_is_validation_error() {
    let harness = harness(vec![realtime("phi3")], MockProvider::new());
    let err = harness
        .dispatcher
        .dispatch(&GatewayRequest::new(
            Operation::Embed,
            "ghost",
            json!({ "text": "x" }),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Validation(_)));
}

#[tokio::test]
async fn bulk_only_model_always_returns_a_job() {
    let harness = harness(
        vec![
            BackendDescriptor::new("mixtral", IntegrationPattern::BulkOnly, "http://localhost:9002")
                .with_dimension(4),
        ],
        MockProvider::new(),
    );
    // Even a single urgent text is queued, never embedded synchronously.
    let outcome = harness
        .dispatcher
        .dispatch(
            &GatewayRequest::new(Operation::Embed, "mixtral", json!({ "text": "x" }))
                .with_urgent(true),
        )
        .await
        .unwrap();
    let DispatchOutcome::Queued(handle) = outcome else {
        panic!("bulk-only model produced a synchronous result");
    };
    assert_eq!(handle.status, JobStatus::Pending);
}

#[tokio::test]
async fn bulk_submission_of_500_items_completes() {
    let harness = harness(
        vec![
            BackendDescriptor::new("mixtral", IntegrationPattern::BulkOnly, "http://localhost:9002")
                .with_dimension(4),
        ],
        MockProvider::new(),
    );
    let _workers = harness.engine.spawn_workers();

    let items: Vec<Value> = (0..500).map(|i| json!(format!("text-{i}"))).collect();
    let outcome = harness
        .dispatcher
        .dispatch(&GatewayRequest::new(
            Operation::Embed,
            "mixtral",
            json!({ "items": items }),
        ))
        .await
        .unwrap();
    let DispatchOutcome::Queued(handle) = outcome else {
        panic!("expected queued outcome");
    };

    assert_eq!(
        harness.engine.status(&handle.job_id).unwrap().progress.total,
        500
    );
    let job = wait_terminal(&harness, &handle.job_id).await;
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress.processed + job.progress.failed, 500);
}

#[tokio::test]
async fn hybrid_pattern_splits_on_urgency_and_size() {
    let harness = harness(
        vec![
            BackendDescriptor::new("nomic", IntegrationPattern::Hybrid, "http://localhost:9003")
                .with_dimension(4),
        ],
        MockProvider::new(),
    );

    // Small batch: synchronous.
    let small = harness
        .dispatcher
        .dispatch(&GatewayRequest::new(
            Operation::Embed,
            "nomic",
            json!({ "items": ["a", "b", "c"] }),
        ))
        .await
        .unwrap();
    assert!(matches!(small, DispatchOutcome::Completed { .. }));

    // Large batch without urgency: queued.
    let items: Vec<Value> = (0..80).map(|i| json!(format!("t{i}"))).collect();
    let large = harness
        .dispatcher
        .dispatch(&GatewayRequest::new(
            Operation::Embed,
            "nomic",
            json!({ "items": items.clone() }),
        ))
        .await
        .unwrap();
    assert!(matches!(large, DispatchOutcome::Queued(_)));

    // Same large batch marked urgent: synchronous.
    let urgent = harness
        .dispatcher
        .dispatch(
            &GatewayRequest::new(Operation::Embed, "nomic", json!({ "items": items }))
                .with_urgent(true),
        )
        .await
        .unwrap();
    assert!(matches!(urgent, DispatchOutcome::Completed { .. }));
}

#[tokio::test]
async fn unhealthy_backend_surfaces_unavailable_after_retries() {
    let harness = harness(vec![realtime("general")], MockProvider::new());
    harness.registry.set_health("general", false);

    let err = harness
        .dispatcher
        .dispatch(
            &GatewayRequest::new(Operation::Embed, "general", json!({ "text": "x" }))
                .with_urgent(true),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Unavailable { .. }));
    // The backend itself was never called.
    assert_eq!(harness.provider.embed_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cancellation_of_large_job_never_reverts_to_pending() {
    let provider = MockProvider::new().with_embed_delay(Duration::from_millis(5));
    let harness = harness(
        vec![
            BackendDescriptor::new("mixtral", IntegrationPattern::BulkOnly, "http://localhost:9002")
                .with_dimension(4),
        ],
        provider,
    );
    let _workers = harness.engine.spawn_workers();

    let items: Vec<Value> = (0..1000).map(|i| json!(format!("text-{i}"))).collect();
    let handle = match harness
        .dispatcher
        .dispatch(&GatewayRequest::new(
            Operation::Embed,
            "mixtral",
            json!({ "items": items }),
        ))
        .await
        .unwrap()
    {
        DispatchOutcome::Queued(handle) => handle,
        other => panic!("expected queued outcome, got {other:?}"),
    };

    // Cancel immediately; the race may resolve either way but the job must
    // end terminal and stay there.
    let _ = harness.engine.cancel(&handle.job_id);
    let job = wait_terminal(&harness, &handle.job_id).await;
    assert!(
        matches!(job.status, JobStatus::Cancelled | JobStatus::Completed),
        "unexpected terminal status {:?}",
        job.status
    );

    // Terminal state is sticky: repeated cancel reports AlreadyTerminal and
    // progress no longer moves.
    let progress_before = job.progress;
    assert!(matches!(
        harness.engine.cancel(&handle.job_id).unwrap_err(),
        GatewayError::AlreadyTerminal { .. }
    ));
    tokio::time::sleep(Duration::from_millis(50)).await;
    let after = harness.engine.status(&handle.job_id).unwrap();
    assert_eq!(after.progress.processed, progress_before.processed);
    assert_eq!(after.progress.failed, progress_before.failed);
}

#[tokio::test]
async fn upsert_invalidates_cached_search() {
    let harness = harness(vec![realtime("phi3")], MockProvider::new());
    let search_payload = json!({ "vector": [0.1, 0.2, 0.3, 0.4], "limit": 5 });

    let first = harness
        .dispatcher
        .dispatch(&GatewayRequest::new(
            Operation::Search,
            "phi3",
            search_payload.clone(),
        ))
        .await
        .unwrap();
    assert!(matches!(first, DispatchOutcome::Completed { cached: false, .. }));

    let second = harness
        .dispatcher
        .dispatch(&GatewayRequest::new(
            Operation::Search,
            "phi3",
            search_payload.clone(),
        ))
        .await
        .unwrap();
    assert!(matches!(second, DispatchOutcome::Completed { cached: true, .. }));

    // Upsert changes the model's data and must drop its cached results.
    harness
        .dispatcher
        .dispatch(&GatewayRequest::new(
            Operation::Upsert,
            "phi3",
            json!({ "items": [{ "id": "doc-1", "text": "fresh" }] }),
        ))
        .await
        .unwrap();
    assert_eq!(harness.store.count("phi3"), 1);

    let third = harness
        .dispatcher
        .dispatch(&GatewayRequest::new(Operation::Search, "phi3", search_payload))
        .await
        .unwrap();
    assert!(matches!(third, DispatchOutcome::Completed { cached: false, .. }));
}

#[tokio::test]
async fn deferred_upsert_drops_cached_search_results() {
    let harness = harness(
        vec![
            BackendDescriptor::new("nomic", IntegrationPattern::Hybrid, "http://localhost:9003")
                .with_dimension(4),
        ],
        MockProvider::new(),
    );
    let _workers = harness.engine.spawn_workers();
    let search_payload = json!({ "vector": [0.1, 0.2, 0.3, 0.4], "limit": 5 });

    harness
        .dispatcher
        .dispatch(&GatewayRequest::new(
            Operation::Search,
            "nomic",
            search_payload.clone(),
        ))
        .await
        .unwrap();

    // Large non-urgent upsert goes through the batch engine.
    let items: Vec<Value> = (0..60)
        .map(|i| json!({ "id": format!("doc-{i}"), "text": format!("body {i}") }))
        .collect();
    let outcome = harness
        .dispatcher
        .dispatch(&GatewayRequest::new(
            Operation::Upsert,
            "nomic",
            json!({ "items": items }),
        ))
        .await
        .unwrap();
    let DispatchOutcome::Queued(handle) = outcome else {
        panic!("expected deferred upsert");
    };
    let job = wait_terminal(&harness, &handle.job_id).await;
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(harness.store.count("nomic"), 60);

    // The write must have dropped the model's cached search results.
    let repeat = harness
        .dispatcher
        .dispatch(&GatewayRequest::new(Operation::Search, "nomic", search_payload))
        .await
        .unwrap();
    assert!(matches!(
        repeat,
        DispatchOutcome::Completed { cached: false, .. }
    ));
}

#[tokio::test]
async fn failed_provider_records_item_errors_but_completes() {
    let provider = MockProvider::new();
    provider.fail_embed.store(true, Ordering::SeqCst);
    let harness = harness(
        vec![
            BackendDescriptor::new("mixtral", IntegrationPattern::BulkOnly, "http://localhost:9002")
                .with_dimension(4)
                .with_max_retries(1),
        ],
        provider,
    );
    let _workers = harness.engine.spawn_workers();

    // One sub-batch worth of items: the job fails it, exhausts consecutive
    // retries, and lands in Failed with every item recorded.
    let items: Vec<Value> = (0..300).map(|i| json!(format!("t{i}"))).collect();
    let handle = harness
        .engine
        .submit("mixtral", Operation::Embed, items)
        .unwrap();
    let job = wait_terminal(&harness, &handle.job_id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.progress.failed > 0);
    assert!(job.last_error.is_some());
    assert!(!job.item_errors.is_empty());
}
