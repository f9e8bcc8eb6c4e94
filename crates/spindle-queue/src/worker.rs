//! Worker pool for processing jobs

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, Semaphore};
use tracing::{debug, error, info, warn};

use crate::backend::QueueBackend;
use crate::job::{JobEntry, JobStatus, RetentionPolicy};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy)]
pub struct WorkerConfig {
    /// Concurrent execution slots.
    pub concurrency: usize,
    /// Sleep between polls of an empty queue.
    pub poll_interval: Duration,
    /// How long a job may stay Active before it is considered abandoned.
    pub visibility_timeout: Duration,
    /// How often the reclaim/prune sweep runs.
    pub housekeeping_interval: Duration,
    pub retention: RetentionPolicy,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            poll_interval: Duration::from_millis(100),
            visibility_timeout: Duration::from_secs(600),
            housekeeping_interval: Duration::from_secs(30),
            retention: RetentionPolicy::default(),
        }
    }
}

/// Context passed to a handler alongside its payload.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub job_id: crate::job::JobId,
    /// 1-based attempt number of this execution.
    pub attempt: u32,
    pub enqueued_at: DateTime<Utc>,
}

/// Error returned by a job handler. All handler failures go through the same
/// attempt-counting retry path; the queue does not classify them.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A handler for one job kind.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn run(&self, ctx: JobContext, payload: serde_json::Value) -> Result<(), HandlerError>;
}

/// Fixed-size pool of executors pulling from a shared queue backend.
///
/// Each slot runs at most one job at a time. Job kinds without a registered
/// handler are acknowledged as no-op successes so producers can introduce new
/// kinds without breaking older workers.
pub struct WorkerPool<B: QueueBackend + ?Sized> {
    backend: Arc<B>,
    config: WorkerConfig,
    handlers: Arc<RwLock<HashMap<String, Arc<dyn JobHandler>>>>,
}

impl<B: QueueBackend + 'static> WorkerPool<B> {
    pub fn new(backend: B, config: WorkerConfig) -> Self {
        Self::new_with_arc(Arc::new(backend), config)
    }
}

impl<B: QueueBackend + ?Sized + 'static> WorkerPool<B> {
    /// Create a pool from an existing Arc backend (supports dyn dispatch).
    pub fn new_with_arc(backend: Arc<B>, config: WorkerConfig) -> Self {
        Self {
            backend,
            config,
            handlers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn backend(&self) -> Arc<B> {
        self.backend.clone()
    }

    /// Register the handler for a job kind.
    pub async fn register(&self, kind: &str, handler: Arc<dyn JobHandler>) {
        self.handlers.write().await.insert(kind.to_string(), handler);
    }

    /// Run the pool until the future is dropped. Spawns the housekeeping
    /// sweep, then loops: claim a slot, dequeue, dispatch. Dropping the
    /// future stops the sweep as well.
    pub async fn start(&self) {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let _housekeeping = AbortOnDrop(self.spawn_housekeeping());

        info!(
            concurrency = self.config.concurrency,
            "Worker pool started"
        );

        loop {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .expect("worker semaphore closed unexpectedly");

            match self.backend.dequeue().await {
                Ok(Some(entry)) => {
                    let backend = self.backend.clone();
                    let handler = self.handlers.read().await.get(&entry.kind).cloned();

                    tokio::spawn(async move {
                        execute_one(backend, handler, entry).await;
                        drop(permit);
                    });
                }
                Ok(None) => {
                    drop(permit);
                    tokio::time::sleep(self.config.poll_interval).await;
                }
                Err(e) => {
                    drop(permit);
                    error!(error = %e, "Queue dequeue error");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    fn spawn_housekeeping(&self) -> tokio::task::JoinHandle<()> {
        let backend = self.backend.clone();
        let config = self.config;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(config.housekeeping_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;

                match backend.reclaim(config.visibility_timeout).await {
                    Ok(0) => {}
                    Ok(n) => warn!(reclaimed = n, "Returned abandoned jobs to the queue"),
                    Err(e) => error!(error = %e, "Reclaim sweep failed"),
                }

                match backend.prune(config.retention).await {
                    Ok(0) => {}
                    Ok(n) => debug!(pruned = n, "Pruned terminal jobs"),
                    Err(e) => error!(error = %e, "Retention prune failed"),
                }

                if let Ok(depth) = backend.pending_depth().await {
                    debug!(depth, "Queue depth");
                }
            }
        })
    }
}

/// Stops the housekeeping task when the pool's `start` future is dropped,
/// so the sweep never outlives the pool and hits a closing database.
struct AbortOnDrop(tokio::task::JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn execute_one<B: QueueBackend + ?Sized>(
    backend: Arc<B>,
    handler: Option<Arc<dyn JobHandler>>,
    entry: JobEntry,
) {
    let Some(handler) = handler else {
        // Forward-compatibility: unknown kinds are a deliberate no-op
        // success, not an error.
        warn!(job_id = %entry.id, kind = %entry.kind, "No handler for job kind, acking as no-op");
        if let Err(e) = backend.ack(entry.id).await {
            error!(job_id = %entry.id, error = %e, "Failed to ack no-op job");
        }
        return;
    };

    let ctx = JobContext {
        job_id: entry.id,
        attempt: entry.attempts + 1,
        enqueued_at: entry.created_at,
    };
    let attempt = ctx.attempt;

    info!(job_id = %entry.id, kind = %entry.kind, attempt, "Processing job");

    match handler.run(ctx, entry.payload.clone()).await {
        Ok(()) => match backend.ack(entry.id).await {
            Ok(()) => info!(job_id = %entry.id, kind = %entry.kind, attempt, "Job completed"),
            Err(e) => error!(job_id = %entry.id, error = %e, "Failed to ack job"),
        },
        Err(e) => match backend.fail(entry.id, &e.0).await {
            Ok(JobStatus::Exhausted) => {
                error!(job_id = %entry.id, kind = %entry.kind, attempt, error = %e, "Job exhausted all attempts");
            }
            Ok(_) => {
                warn!(job_id = %entry.id, kind = %entry.kind, attempt, error = %e, "Job failed, retry scheduled");
            }
            Err(qe) => error!(job_id = %entry.id, error = %qe, "Failed to record job failure"),
        },
    }
}
