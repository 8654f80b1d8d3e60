//! Batch job engine — durable queue of bulk jobs with a fixed worker pool.
//!
//! Workers pull the oldest pending job by id from a shared queue, so no two
//! workers ever operate on the same job and progress updates need nothing
//! stronger than the per-job lock. Backends are re-resolved through the
//! router at every sub-batch, which is what lets a mid-job failover succeed
//! instead of stranding the job on a dead backend.
//!
//! Terminal states are final. A job reaches `Completed` once every
//! sub-batch has been *attempted* — partial item failures accumulate on the
//! record without aborting the run. Cancellation is cooperative: the flag is
//! checked between sub-batches, never mid-call.

use crate::cache::ResponseCache;
use crate::error::{GatewayError, GatewayResult};
use crate::provider::ProviderClient;
use crate::registry::{BackendRegistry, BackendSnapshot};
use crate::retry::{RetryPolicy, with_timeout};
use crate::router::Router;
use crate::store::{VectorRecord, VectorStore};
use crate::types::{IntegrationPattern, Operation};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

// ─────────────────────────────────────────────────────────────────────────────
// Job data model
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle state of a [`BatchJob`]. Transitions are monotonic:
/// `Pending → Running → {Completed, Failed, Cancelled}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Terminal jobs are immutable; no resubmission, no further progress.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

/// Item counters. `processed + failed <= total` at all times.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct JobProgress {
    pub processed: usize,
    pub failed: usize,
    pub total: usize,
}

/// Failure record for one item, kept on the job for later inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemFailure {
    /// Index into the job's original item sequence.
    pub index: usize,
    pub error: String,
}

/// Snapshot of one bulk job, as returned by [`BatchEngine::status`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchJob {
    pub job_id: String,
    pub model: String,
    pub operation: Operation,
    pub status: JobStatus,
    pub progress: JobProgress,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub item_errors: Vec<ItemFailure>,
}

/// What a caller gets back from a submission: enough to poll later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobHandle {
    pub job_id: String,
    pub status: JobStatus,
}

/// Queue observability for the aggregate health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
    pub queue_depth: usize,
    pub active_workers: usize,
    pub per_model_backlog: HashMap<String, usize>,
}

struct JobRecord {
    job: BatchJob,
    items: Vec<Value>,
    cancel_requested: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Engine configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Tunables for the worker pool.
#[derive(Debug, Clone)]
pub struct BatchEngineConfig {
    /// Worker pool size.
    pub workers: usize,
    /// Items per sub-batch.
    pub sub_batch_size: usize,
    /// Sub-batch retry policy (job-level `max_retries` comes from the
    /// backend descriptor when available).
    pub retry: RetryPolicy,
    /// Idle worker poll interval; also the requeue delay when no backend is
    /// available for a pending job.
    pub idle_poll: Duration,
}

impl Default for BatchEngineConfig {
    fn default() -> Self {
        Self {
            workers: 3,
            sub_batch_size: 100,
            retry: RetryPolicy::default(),
            idle_poll: Duration::from_millis(500),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// BatchEngine
// ─────────────────────────────────────────────────────────────────────────────

/// Owner of all job state. Callers submit, poll, and cancel; only the
/// engine's workers mutate `status` and `progress`.
pub struct BatchEngine {
    registry: Arc<BackendRegistry>,
    router: Arc<Router>,
    provider: Arc<dyn ProviderClient>,
    store: Arc<dyn VectorStore>,
    cache: Arc<ResponseCache>,
    jobs: DashMap<String, Arc<Mutex<JobRecord>>>,
    pending: Mutex<VecDeque<String>>,
    work_available: Notify,
    active_workers: AtomicUsize,
    config: BatchEngineConfig,
}

impl BatchEngine {
    pub fn new(
        registry: Arc<BackendRegistry>,
        router: Arc<Router>,
        provider: Arc<dyn ProviderClient>,
        store: Arc<dyn VectorStore>,
        cache: Arc<ResponseCache>,
        config: BatchEngineConfig,
    ) -> Self {
        Self {
            registry,
            router,
            provider,
            store,
            cache,
            jobs: DashMap::new(),
            pending: Mutex::new(VecDeque::new()),
            work_available: Notify::new(),
            active_workers: AtomicUsize::new(0),
            config,
        }
    }

    /// Enqueue a bulk job. Never blocks on backend latency — validation and
    /// an in-memory enqueue are the only work done here.
    pub fn submit(
        &self,
        model: &str,
        operation: Operation,
        items: Vec<Value>,
    ) -> GatewayResult<JobHandle> {
        if items.is_empty() {
            return Err(GatewayError::Validation("items cannot be empty".into()));
        }
        if self.registry.find_model(model).is_none() {
            return Err(GatewayError::Validation(format!("unknown model '{model}'")));
        }
        if operation == Operation::Search {
            return Err(GatewayError::Validation(
                "search cannot be processed as a bulk job".into(),
            ));
        }

        let job_id = Uuid::new_v4().to_string();
        let job = BatchJob {
            job_id: job_id.clone(),
            model: model.to_string(),
            operation,
            status: JobStatus::Pending,
            progress: JobProgress {
                processed: 0,
                failed: 0,
                total: items.len(),
            },
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            last_error: None,
            item_errors: Vec::new(),
        };
        info!(job_id = %job_id, model, total = items.len(), "batch job submitted");

        self.jobs.insert(
            job_id.clone(),
            Arc::new(Mutex::new(JobRecord {
                job,
                items,
                cancel_requested: false,
            })),
        );
        self.pending.lock().push_back(job_id.clone());
        self.work_available.notify_one();

        Ok(JobHandle {
            job_id,
            status: JobStatus::Pending,
        })
    }

    /// Snapshot a job's current state.
    pub fn status(&self, job_id: &str) -> GatewayResult<BatchJob> {
        self.jobs
            .get(job_id)
            .map(|record| record.lock().job.clone())
            .ok_or_else(|| GatewayError::JobNotFound(job_id.to_string()))
    }

    /// Request cancellation.
    ///
    /// Pending jobs are cancelled immediately; running jobs get a flag that
    /// the owning worker checks between sub-batches, so a job near its last
    /// sub-batch may still complete normally. Terminal jobs return
    /// [`GatewayError::AlreadyTerminal`].
    pub fn cancel(&self, job_id: &str) -> GatewayResult<JobStatus> {
        let record = self
            .jobs
            .get(job_id)
            .map(|r| Arc::clone(&r))
            .ok_or_else(|| GatewayError::JobNotFound(job_id.to_string()))?;

        let mut record = record.lock();
        match record.job.status {
            status if status.is_terminal() => Err(GatewayError::AlreadyTerminal {
                job_id: job_id.to_string(),
                status,
            }),
            JobStatus::Pending => {
                self.pending.lock().retain(|id| id != job_id);
                record.job.status = JobStatus::Cancelled;
                record.job.completed_at = Some(Utc::now());
                info!(job_id, "pending job cancelled");
                Ok(JobStatus::Cancelled)
            }
            JobStatus::Running => {
                record.cancel_requested = true;
                debug!(job_id, "cancellation requested for running job");
                Ok(JobStatus::Running)
            }
            _ => unreachable!("terminal statuses handled above"),
        }
    }

    /// Queue depth, active worker count, and per-model backlog.
    pub fn queue_stats(&self) -> QueueStats {
        let pending = self.pending.lock().clone();
        let mut per_model_backlog: HashMap<String, usize> = HashMap::new();
        for job_id in &pending {
            if let Some(record) = self.jobs.get(job_id) {
                let model = record.lock().job.model.clone();
                *per_model_backlog.entry(model).or_default() += 1;
            }
        }
        QueueStats {
            queue_depth: pending.len(),
            active_workers: self.active_workers.load(Ordering::Relaxed),
            per_model_backlog,
        }
    }

    /// Re-queue jobs left in `Running` by a previous incarnation of the
    /// process. Call before spawning workers. Downstream upserts are
    /// idempotent by item id, so at-least-once reprocessing is safe.
    pub fn recover_interrupted(&self) -> usize {
        let mut recovered = 0;
        for entry in self.jobs.iter() {
            let mut record = entry.lock();
            if record.job.status == JobStatus::Running {
                record.job.status = JobStatus::Pending;
                record.job.started_at = None;
                self.pending.lock().push_back(record.job.job_id.clone());
                recovered += 1;
            }
        }
        if recovered > 0 {
            warn!(recovered, "re-queued jobs interrupted by restart");
            self.work_available.notify_waiters();
        }
        recovered
    }

    /// Spawn the worker pool.
    pub fn spawn_workers(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        (0..self.config.workers)
            .map(|worker_id| {
                let engine = Arc::clone(self);
                tokio::spawn(async move { engine.worker_loop(worker_id).await })
            })
            .collect()
    }

    async fn worker_loop(&self, worker_id: usize) {
        debug!(worker_id, "batch worker started");
        loop {
            let next = self.pending.lock().pop_front();
            match next {
                Some(job_id) => {
                    self.active_workers.fetch_add(1, Ordering::Relaxed);
                    self.process_job(&job_id).await;
                    self.active_workers.fetch_sub(1, Ordering::Relaxed);
                }
                None => {
                    tokio::select! {
                        _ = self.work_available.notified() => {}
                        _ = tokio::time::sleep(self.config.idle_poll) => {}
                    }
                }
            }
        }
    }

    // ── Job processing ───────────────────────────────────────────────────────

    async fn process_job(&self, job_id: &str) {
        let Some(record) = self.jobs.get(job_id).map(|r| Arc::clone(&r)) else {
            return;
        };

        let (model, operation, total) = {
            let record = record.lock();
            // Cancelled while queued; nothing to do.
            if record.job.status != JobStatus::Pending {
                return;
            }
            (
                record.job.model.clone(),
                record.job.operation,
                record.items.len(),
            )
        };

        let Some(primary) = self.registry.find_model(&model) else {
            self.finish(&record, JobStatus::Failed, Some(format!("unknown model '{model}'")));
            return;
        };
        let pattern = primary.descriptor.pattern;
        let retry = self.config.retry.with_max_retries(primary.descriptor.max_retries);

        // No healthy backend yet: leave the job Pending and let a worker
        // retry on its next pull rather than burning the retry budget.
        if self.router.select_backend(pattern, &model).is_err() {
            debug!(job_id, model, "no backend available, re-queueing pending job");
            tokio::time::sleep(self.config.idle_poll).await;
            self.pending.lock().push_back(job_id.to_string());
            return;
        }

        {
            let mut record = record.lock();
            if record.job.status != JobStatus::Pending {
                return;
            }
            record.job.status = JobStatus::Running;
            record.job.started_at = Some(Utc::now());
        }
        info!(job_id, model, total, "batch job running");

        let mut consecutive_failed_batches: u32 = 0;
        let mut offset = 0;
        while offset < total {
            // Cooperative cancellation checkpoint.
            {
                let mut rec = record.lock();
                if rec.cancel_requested {
                    rec.job.status = JobStatus::Cancelled;
                    rec.job.completed_at = Some(Utc::now());
                    info!(job_id, "batch job cancelled mid-run");
                    return;
                }
            }

            let chunk: Vec<(usize, Value)> = {
                let rec = record.lock();
                let end = (offset + self.config.sub_batch_size).min(total);
                rec.items[offset..end]
                    .iter()
                    .cloned()
                    .enumerate()
                    .map(|(i, item)| (offset + i, item))
                    .collect()
            };
            let chunk_len = chunk.len();

            match self
                .run_sub_batch(&record, pattern, &model, operation, chunk, retry)
                .await
            {
                SubBatchOutcome::Attempted => consecutive_failed_batches = 0,
                SubBatchOutcome::FullyFailed => {
                    consecutive_failed_batches += 1;
                    if consecutive_failed_batches > retry.max_retries {
                        let error = {
                            let rec = record.lock();
                            rec.job.last_error.clone()
                        };
                        warn!(
                            job_id,
                            consecutive_failed_batches,
                            "batch job failed: consecutive sub-batch failures exhausted retries"
                        );
                        self.finish(&record, JobStatus::Failed, error);
                        return;
                    }
                }
            }
            offset += chunk_len;
        }

        let progress = record.lock().job.progress;
        info!(
            job_id,
            processed = progress.processed,
            failed = progress.failed,
            "batch job completed"
        );
        self.finish(&record, JobStatus::Completed, None);
    }

    /// Process one sub-batch: validate items, then execute the valid subset
    /// against a freshly-routed backend with retries. Item failures are
    /// recorded on the job; the sub-batch as a whole only counts as failed
    /// when the backend call exhausts its retries. Write operations drop the
    /// model's cached results as soon as their sub-batch lands, the same
    /// side effect the synchronous path applies.
    async fn run_sub_batch(
        &self,
        record: &Arc<Mutex<JobRecord>>,
        pattern: IntegrationPattern,
        model: &str,
        operation: Operation,
        chunk: Vec<(usize, Value)>,
        retry: RetryPolicy,
    ) -> SubBatchOutcome {
        // Per-item validation happens before any network call; invalid
        // items are failed individually without aborting the job.
        let mut valid: Vec<(usize, Value)> = Vec::with_capacity(chunk.len());
        {
            let mut rec = record.lock();
            for (index, item) in chunk {
                match validate_item(operation, &item) {
                    Ok(()) => valid.push((index, item)),
                    Err(message) => {
                        rec.job.progress.failed += 1;
                        rec.job.item_errors.push(ItemFailure { index, error: message });
                    }
                }
            }
        }
        if valid.is_empty() {
            return SubBatchOutcome::Attempted;
        }

        let mut last_error: Option<GatewayError> = None;
        for attempt in 0..=retry.max_retries {
            if attempt > 0 {
                tokio::time::sleep(retry.delay(attempt - 1)).await;
            }
            // Re-resolve the backend every attempt so a failover mid-job is
            // picked up immediately.
            let backend = match self.router.select_backend(pattern, model) {
                Ok(backend) => backend,
                Err(err) => {
                    last_error = Some(err);
                    continue;
                }
            };
            let _guard = self.router.begin_dispatch(&backend.descriptor.name);
            match self.execute_items(&backend, operation, &valid).await {
                Ok(()) => {
                    record.lock().job.progress.processed += valid.len();
                    if matches!(operation, Operation::Upsert | Operation::Delete) {
                        self.cache.invalidate_model(model);
                    }
                    return SubBatchOutcome::Attempted;
                }
                Err(err) => {
                    debug!(
                        backend = %backend.descriptor.name,
                        attempt,
                        error = %err,
                        "sub-batch attempt failed"
                    );
                    last_error = Some(err);
                }
            }
        }

        let message = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "sub-batch failed".to_string());
        let mut rec = record.lock();
        rec.job.progress.failed += valid.len();
        for (index, _) in &valid {
            rec.job.item_errors.push(ItemFailure {
                index: *index,
                error: message.clone(),
            });
        }
        rec.job.last_error = Some(message);
        SubBatchOutcome::FullyFailed
    }

    async fn execute_items(
        &self,
        backend: &BackendSnapshot,
        operation: Operation,
        items: &[(usize, Value)],
    ) -> GatewayResult<()> {
        let descriptor = &backend.descriptor;
        let timeout = Duration::from_millis(descriptor.timeout_ms);
        match operation {
            Operation::Embed => {
                let inputs: Vec<Value> = items.iter().map(|(_, v)| embed_input(v)).collect();
                with_timeout(timeout, descriptor.name.clone(), descriptor.timeout_ms,
                    self.provider.embed(descriptor, &inputs))
                .await?;
                Ok(())
            }
            Operation::Upsert => {
                let inputs: Vec<Value> = items.iter().map(|(_, v)| embed_input(v)).collect();
                let vectors = with_timeout(timeout, descriptor.name.clone(), descriptor.timeout_ms,
                    self.provider.embed(descriptor, &inputs))
                .await?;
                let records: Vec<VectorRecord> = items
                    .iter()
                    .zip(vectors)
                    .map(|((_, item), vector)| VectorRecord {
                        id: item_id(item),
                        vector,
                        payload: item.clone(),
                    })
                    .collect();
                self.store.upsert(&descriptor.model, &records).await
            }
            Operation::Delete => {
                let ids: Vec<String> = items.iter().map(|(_, v)| item_id(v)).collect();
                self.store.delete(&descriptor.model, &ids).await
            }
            // Rejected at submit time.
            Operation::Search => Err(GatewayError::Validation(
                "search cannot be processed as a bulk job".into(),
            )),
        }
    }

    fn finish(&self, record: &Arc<Mutex<JobRecord>>, status: JobStatus, error: Option<String>) {
        let mut rec = record.lock();
        if rec.job.status.is_terminal() {
            return;
        }
        rec.job.status = status;
        rec.job.completed_at = Some(Utc::now());
        if error.is_some() {
            rec.job.last_error = error;
        }
    }
}

enum SubBatchOutcome {
    /// The sub-batch was fully attempted (individual items may have failed).
    Attempted,
    /// Every valid item failed after exhausting the retry budget.
    FullyFailed,
}

// ─────────────────────────────────────────────────────────────────────────────
// Item helpers
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) fn validate_item(operation: Operation, item: &Value) -> Result<(), String> {
    match operation {
        Operation::Embed | Operation::Upsert => {
            let has_text = item.is_string()
                || item.get("text").and_then(Value::as_str).is_some()
                || item.get("vector").and_then(Value::as_array).is_some();
            if has_text {
                Ok(())
            } else {
                Err("item has neither 'text' nor 'vector'".to_string())
            }
        }
        Operation::Delete => {
            let has_id = item.is_string() || item.get("id").is_some();
            if has_id {
                Ok(())
            } else {
                Err("item has no 'id'".to_string())
            }
        }
        Operation::Search => Err("search items are not batchable".to_string()),
    }
}

/// What the provider should embed for this item: bare strings pass through,
/// objects contribute their `text` field.
pub(crate) fn embed_input(item: &Value) -> Value {
    if item.is_string() {
        item.clone()
    } else {
        item.get("text").cloned().unwrap_or_else(|| item.clone())
    }
}

/// Stable id for a record: explicit `id`, the bare string itself, or a
/// fresh uuid for anonymous items.
pub(crate) fn item_id(item: &Value) -> String {
    if let Some(id) = item.get("id") {
        match id {
            Value::String(s) => return s.clone(),
            other => return other.to_string(),
        }
    }
    if let Some(s) = item.as_str() {
        return s.to_string();
    }
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::BackendDescriptor;
    use crate::router::RouteStrategy;
    use async_trait::async_trait;
    use serde_json::json;

    struct NoopProvider;

    #[async_trait]
    impl ProviderClient for NoopProvider {
        async fn embed(
            &self,
            backend: &BackendDescriptor,
            inputs: &[Value],
        ) -> GatewayResult<Vec<Vec<f32>>> {
            Ok(vec![vec![0.0; backend.dimension]; inputs.len()])
        }

        async fn health(&self, _backend: &BackendDescriptor) -> bool {
            true
        }
    }

    struct NoopStore;

    #[async_trait]
    impl VectorStore for NoopStore {
        async fn search(
            &self,
            _collection: &str,
            _vector: &[f32],
            _limit: usize,
            _filter: Option<&Value>,
        ) -> GatewayResult<Value> {
            Ok(json!({ "results": [] }))
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

    fn engine() -> BatchEngine {
        let registry = Arc::new(BackendRegistry::new());
        registry
            .register(BackendDescriptor::new(
                "mixtral",
                IntegrationPattern::BulkOnly,
                "http://localhost:9002",
            ))
            .unwrap();
        let router = Arc::new(Router::new(
            Arc::clone(&registry),
            RouteStrategy::WeightedRandom,
        ));
        BatchEngine::new(
            registry,
            router,
            Arc::new(NoopProvider),
            Arc::new(NoopStore),
            Arc::new(ResponseCache::new()),
            BatchEngineConfig::default(),
        )
    }

    #[test]
    fn submit_empty_items_is_validation_error() {
        let err = engine()
            .submit("mixtral", Operation::Embed, vec![])
            .unwrap_err();
        assert!(matches!(err, GatewayError::Validation(_)));
    }

    #[test]
    fn submit_unknown_model_is_validation_error() {
        let err = engine()
            .submit("ghost", Operation::Embed, vec![json!("a")])
            .unwrap_err();
        assert!(matches!(err, GatewayError::Validation(_)));
    }

    #[test]
    fn submit_returns_pending_handle() {
        let engine = engine();
        let handle = engine
            .submit("mixtral", Operation::Embed, vec![json!("a"), json!("b")])
            .unwrap();
        assert_eq!(handle.status, JobStatus::Pending);

        let job = engine.status(&handle.job_id).unwrap();
        assert_eq!(job.progress.total, 2);
        assert_eq!(job.progress.processed, 0);
        assert_eq!(engine.queue_stats().queue_depth, 1);
    }

    #[test]
    fn cancel_pending_job_is_immediate() {
        let engine = engine();
        let handle = engine
            .submit("mixtral", Operation::Embed, vec![json!("a")])
            .unwrap();
        assert_eq!(engine.cancel(&handle.job_id).unwrap(), JobStatus::Cancelled);
        assert_eq!(engine.queue_stats().queue_depth, 0);

        // Repeated cancel on a terminal job.
        let err = engine.cancel(&handle.job_id).unwrap_err();
        assert!(matches!(err, GatewayError::AlreadyTerminal { .. }));
    }

    #[test]
    fn status_of_unknown_job_is_not_found() {
        assert!(matches!(
            engine().status("nope").unwrap_err(),
            GatewayError::JobNotFound(_)
        ));
    }

    #[test]
    fn recover_requeues_running_jobs() {
        let engine = engine();
        let handle = engine
            .submit("mixtral", Operation::Embed, vec![json!("a")])
            .unwrap();
        // Simulate a job caught mid-run by a restart.
        {
            let record = engine.jobs.get(&handle.job_id).map(|r| Arc::clone(&r)).unwrap();
            record.lock().job.status = JobStatus::Running;
            engine.pending.lock().clear();
        }
        assert_eq!(engine.recover_interrupted(), 1);
        assert_eq!(engine.status(&handle.job_id).unwrap().status, JobStatus::Pending);
        assert_eq!(engine.queue_stats().queue_depth, 1);
    }

    #[test]
    fn item_helpers() {
        assert_eq!(item_id(&json!({ "id": "doc-1", "text": "x" })), "doc-1");
        assert_eq!(item_id(&json!("raw")), "raw");
        assert!(validate_item(Operation::Embed, &json!({ "text": "x" })).is_ok());
        assert!(validate_item(Operation::Embed, &json!({ "nope": 1 })).is_err());
        assert!(validate_item(Operation::Delete, &json!({ "id": "a" })).is_ok());
    }

    #[tokio::test]
    async fn worker_completes_submitted_job() {
        let engine = Arc::new(engine());
        let _workers = engine.spawn_workers();
        let handle = engine
            .submit(
                "mixtral",
                Operation::Embed,
                (0..250).map(|i| json!(format!("text-{i}"))).collect(),
            )
            .unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let job = engine.status(&handle.job_id).unwrap();
            assert!(job.progress.processed + job.progress.failed <= job.progress.total);
            if job.status.is_terminal() {
                assert_eq!(job.status, JobStatus::Completed);
                assert_eq!(job.progress.processed, 250);
                assert_eq!(job.progress.failed, 0);
                break;
            }
            assert!(tokio::time::Instant::now() < deadline, "job did not finish");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}
