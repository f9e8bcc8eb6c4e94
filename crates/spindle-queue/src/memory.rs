//! In-memory queue backend
//!
//! Single-process reference backend used by tests and by deployments that do
//! not need durability. Jobs are kept in a map; a min-heap on `run_at`
//! decides dispatch order.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::backend::{QueueBackend, QueueError};
use crate::job::{JobEntry, JobId, JobStatus, RetentionPolicy, RetryPolicy};

/// Heap entry ordered by run_at time (earliest first)
#[derive(Debug, Clone, Eq, PartialEq)]
struct DueEntry {
    run_at: DateTime<Utc>,
    id: Uuid,
}

impl Ord for DueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order: earlier run_at = higher priority
        other
            .run_at
            .cmp(&self.run_at)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for DueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Default)]
struct Inner {
    jobs: HashMap<Uuid, JobEntry>,
    due: BinaryHeap<DueEntry>,
}

#[derive(Debug, Default, Clone)]
pub struct MemoryQueue {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueBackend for MemoryQueue {
    async fn enqueue(
        &self,
        kind: &str,
        payload: serde_json::Value,
        policy: RetryPolicy,
    ) -> Result<JobId, QueueError> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        let entry = JobEntry {
            id,
            kind: kind.to_string(),
            payload,
            status: JobStatus::Pending,
            attempts: 0,
            max_attempts: policy.max_attempts,
            backoff_base_secs: policy.backoff_base_secs,
            created_at: now,
            run_at: now,
            locked_at: None,
            finished_at: None,
            last_error: None,
        };

        let mut inner = self.inner.write().await;
        inner.due.push(DueEntry { run_at: now, id });
        inner.jobs.insert(id, entry);

        Ok(id)
    }

    async fn dequeue(&self) -> Result<Option<JobEntry>, QueueError> {
        // Single writer lock for the whole claim: no two callers can walk the
        // heap at once, so a job is delivered to at most one of them.
        let mut inner = self.inner.write().await;
        let now = Utc::now();

        loop {
            let due = inner.due.peek().map(|head| head.run_at <= now).unwrap_or(false);
            if !due {
                return Ok(None);
            }

            let head = inner.due.pop().unwrap();
            if let Some(job) = inner.jobs.get_mut(&head.id) {
                // Stale heap entries (re-pushed or already claimed jobs) are
                // skipped; only a waiting job is claimable.
                if matches!(job.status, JobStatus::Pending | JobStatus::PendingRetry)
                    && job.run_at <= now
                {
                    job.status = JobStatus::Active;
                    job.locked_at = Some(now);
                    return Ok(Some(job.clone()));
                }
            }
        }
    }

    async fn ack(&self, id: JobId) -> Result<(), QueueError> {
        let mut inner = self.inner.write().await;
        let job = inner.jobs.get_mut(&id).ok_or(QueueError::NotFound)?;

        if job.status == JobStatus::Completed {
            return Ok(());
        }

        job.status = JobStatus::Completed;
        job.locked_at = None;
        job.finished_at = Some(Utc::now());
        Ok(())
    }

    async fn fail(&self, id: JobId, error: &str) -> Result<JobStatus, QueueError> {
        let mut inner = self.inner.write().await;
        let now = Utc::now();

        let (status, due) = {
            let job = inner.jobs.get_mut(&id).ok_or(QueueError::NotFound)?;

            job.attempts += 1;
            job.last_error = Some(error.to_string());
            job.locked_at = None;

            if job.attempts < job.max_attempts {
                let backoff = job.retry_policy().backoff(job.attempts);
                job.status = JobStatus::PendingRetry;
                job.run_at = now
                    + ChronoDuration::from_std(backoff)
                        .unwrap_or_else(|_| ChronoDuration::seconds(0));
                (
                    JobStatus::PendingRetry,
                    Some(DueEntry {
                        run_at: job.run_at,
                        id,
                    }),
                )
            } else {
                job.status = JobStatus::Exhausted;
                job.finished_at = Some(now);
                (JobStatus::Exhausted, None)
            }
        };

        if let Some(entry) = due {
            inner.due.push(entry);
        }

        Ok(status)
    }

    async fn get_job(&self, id: JobId) -> Result<JobEntry, QueueError> {
        let inner = self.inner.read().await;
        inner.jobs.get(&id).cloned().ok_or(QueueError::NotFound)
    }

    async fn get_status(&self, id: JobId) -> Result<JobStatus, QueueError> {
        let inner = self.inner.read().await;
        inner
            .jobs
            .get(&id)
            .map(|j| j.status)
            .ok_or(QueueError::NotFound)
    }

    async fn list_exhausted(&self, limit: u32) -> Result<Vec<JobEntry>, QueueError> {
        let inner = self.inner.read().await;
        let mut dead: Vec<JobEntry> = inner
            .jobs
            .values()
            .filter(|j| j.status == JobStatus::Exhausted)
            .cloned()
            .collect();
        dead.sort_by(|a, b| b.finished_at.cmp(&a.finished_at));
        dead.truncate(limit as usize);
        Ok(dead)
    }

    async fn reclaim(&self, visibility: Duration) -> Result<u64, QueueError> {
        let mut inner = self.inner.write().await;
        let now = Utc::now();
        let cutoff = now
            - ChronoDuration::from_std(visibility).unwrap_or_else(|_| ChronoDuration::seconds(0));

        let mut reclaimed = Vec::new();
        for job in inner.jobs.values_mut() {
            if job.status == JobStatus::Active && job.locked_at.map(|t| t <= cutoff).unwrap_or(true)
            {
                job.status = JobStatus::Pending;
                job.locked_at = None;
                job.run_at = now;
                reclaimed.push(job.id);
            }
        }
        for id in &reclaimed {
            inner.due.push(DueEntry { run_at: now, id: *id });
        }

        Ok(reclaimed.len() as u64)
    }

    async fn prune(&self, retention: RetentionPolicy) -> Result<u64, QueueError> {
        let mut inner = self.inner.write().await;
        let now = Utc::now();
        let completed_cutoff = now
            - ChronoDuration::from_std(retention.completed_max_age)
                .unwrap_or_else(|_| ChronoDuration::zero());
        let exhausted_cutoff = now
            - ChronoDuration::from_std(retention.exhausted_max_age)
                .unwrap_or_else(|_| ChronoDuration::zero());

        let before = inner.jobs.len();
        inner.jobs.retain(|_, job| match (job.status, job.finished_at) {
            (JobStatus::Completed, Some(done)) => done > completed_cutoff,
            (JobStatus::Exhausted, Some(done)) => done > exhausted_cutoff,
            _ => true,
        });

        Ok((before - inner.jobs.len()) as u64)
    }

    async fn pending_depth(&self) -> Result<u64, QueueError> {
        let inner = self.inner.read().await;
        let depth = inner
            .jobs
            .values()
            .filter(|j| matches!(j.status, JobStatus::Pending | JobStatus::PendingRetry))
            .count();
        Ok(depth as u64)
    }
}
