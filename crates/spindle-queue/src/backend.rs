//! Queue backend trait

use crate::job::{JobEntry, JobId, JobStatus, RetentionPolicy, RetryPolicy};
use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// Durable store unreachable; surfaced to the enqueue caller, not retried.
    #[error("Queue unavailable: {0}")]
    Unavailable(String),
    #[error("Job not found")]
    NotFound,
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Durable job storage. Delivery is at-least-once: a claimed job may be
/// redelivered after its visibility timeout, but is never held by two
/// workers simultaneously.
#[async_trait]
pub trait QueueBackend: Send + Sync {
    /// Enqueue a payload under a job kind. Returns immediately with the job
    /// id; does not wait for execution.
    async fn enqueue(
        &self,
        kind: &str,
        payload: serde_json::Value,
        policy: RetryPolicy,
    ) -> Result<JobId, QueueError>;

    /// Atomically claim the next due job, moving it to `Active`.
    /// Returns `None` when nothing is due.
    async fn dequeue(&self) -> Result<Option<JobEntry>, QueueError>;

    /// Mark a job completed. Idempotent.
    async fn ack(&self, id: JobId) -> Result<(), QueueError>;

    /// Record a failed attempt. Schedules a retry with backoff while attempts
    /// remain, otherwise moves the job to `Exhausted`. Returns the resulting
    /// status so callers can log the terminal outcome.
    async fn fail(&self, id: JobId, error: &str) -> Result<JobStatus, QueueError>;

    async fn get_job(&self, id: JobId) -> Result<JobEntry, QueueError>;

    async fn get_status(&self, id: JobId) -> Result<JobStatus, QueueError>;

    /// Exhausted jobs, most recently failed first.
    async fn list_exhausted(&self, limit: u32) -> Result<Vec<JobEntry>, QueueError>;

    /// Return `Active` jobs locked longer than `visibility` to `Pending`
    /// without consuming an attempt. Returns how many were reclaimed.
    async fn reclaim(&self, visibility: Duration) -> Result<u64, QueueError>;

    /// Delete terminal jobs past their retention window. Returns how many
    /// were deleted.
    async fn prune(&self, retention: RetentionPolicy) -> Result<u64, QueueError>;

    /// Number of jobs waiting to run (pending plus pending-retry).
    async fn pending_depth(&self) -> Result<u64, QueueError>;
}
