//! Durable queue backend on SQLite
//!
//! Claiming is a single `UPDATE .. WHERE id = (SELECT ..) RETURNING` so a due
//! job moves to `active` atomically; no two workers can hold the same row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::time::Duration;
use uuid::Uuid;

use spindle_queue::backend::{QueueBackend, QueueError};
use spindle_queue::job::{JobEntry, JobId, JobStatus, RetentionPolicy, RetryPolicy, MAX_BACKOFF_SECS};

pub struct SqliteQueueBackend {
    pool: SqlitePool,
}

impl SqliteQueueBackend {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

const ENTRY_COLUMNS: &str = "id, kind, payload, status, attempts, max_attempts, \
     backoff_base_secs, created_at, run_at, locked_at, finished_at, last_error";

fn backend_err(e: impl std::fmt::Display) -> QueueError {
    QueueError::Unavailable(e.to_string())
}

fn ts(value: DateTime<Utc>) -> i64 {
    value.timestamp()
}

fn from_ts(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

fn entry_from_row(row: &SqliteRow) -> Result<JobEntry, QueueError> {
    let id: String = row.try_get("id").map_err(backend_err)?;
    let id = Uuid::parse_str(&id).map_err(|_| QueueError::Unavailable("Invalid job id".into()))?;
    let status: String = row.try_get("status").map_err(backend_err)?;
    let status = JobStatus::parse(&status)
        .ok_or_else(|| QueueError::Unavailable(format!("Invalid job status: {status}")))?;
    let payload: Value = row.try_get("payload").map_err(backend_err)?;

    Ok(JobEntry {
        id,
        kind: row.try_get("kind").map_err(backend_err)?,
        payload,
        status,
        attempts: row.try_get::<i64, _>("attempts").map_err(backend_err)? as u32,
        max_attempts: row.try_get::<i64, _>("max_attempts").map_err(backend_err)? as u32,
        backoff_base_secs: row
            .try_get::<i64, _>("backoff_base_secs")
            .map_err(backend_err)? as u64,
        created_at: from_ts(row.try_get("created_at").map_err(backend_err)?),
        run_at: from_ts(row.try_get("run_at").map_err(backend_err)?),
        locked_at: row
            .try_get::<Option<i64>, _>("locked_at")
            .map_err(backend_err)?
            .map(from_ts),
        finished_at: row
            .try_get::<Option<i64>, _>("finished_at")
            .map_err(backend_err)?
            .map(from_ts),
        last_error: row.try_get("last_error").map_err(backend_err)?,
    })
}

#[async_trait]
impl QueueBackend for SqliteQueueBackend {
    async fn enqueue(
        &self,
        kind: &str,
        payload: Value,
        policy: RetryPolicy,
    ) -> Result<JobId, QueueError> {
        let id = Uuid::new_v4();
        let now = ts(Utc::now());

        sqlx::query(
            "INSERT INTO jobs (id, kind, payload, status, max_attempts, backoff_base_secs, created_at, run_at) \
             VALUES (?, ?, ?, 'pending', ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(kind)
        .bind(payload)
        .bind(policy.max_attempts as i64)
        .bind(policy.backoff_base_secs as i64)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(backend_err)?;

        Ok(id)
    }

    async fn dequeue(&self) -> Result<Option<JobEntry>, QueueError> {
        let now = ts(Utc::now());

        let query = format!(
            "UPDATE jobs SET status = 'active', locked_at = ?1 \
             WHERE id = ( \
                 SELECT id FROM jobs \
                 WHERE status IN ('pending', 'pending_retry') AND run_at <= ?1 \
                 ORDER BY created_at ASC, id ASC \
                 LIMIT 1 \
             ) \
             RETURNING {ENTRY_COLUMNS}"
        );

        let row = sqlx::query(&query)
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_err)?;

        row.as_ref().map(entry_from_row).transpose()
    }

    async fn ack(&self, id: JobId) -> Result<(), QueueError> {
        let now = ts(Utc::now());

        let result = sqlx::query(
            "UPDATE jobs SET status = 'completed', locked_at = NULL, \
             finished_at = COALESCE(finished_at, ?) \
             WHERE id = ? AND status != 'exhausted'",
        )
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(backend_err)?;

        if result.rows_affected() == 0 {
            // Idempotency check: the job may simply be gone
            self.get_status(id).await?;
        }
        Ok(())
    }

    async fn fail(&self, id: JobId, error: &str) -> Result<JobStatus, QueueError> {
        let now = ts(Utc::now());

        // Column references on the right-hand side of SET see pre-update
        // values, so `attempts` here is the count before this failure.
        let row = sqlx::query(
            "UPDATE jobs SET \
                 attempts = attempts + 1, \
                 last_error = ?2, \
                 locked_at = NULL, \
                 status = CASE WHEN attempts + 1 < max_attempts \
                               THEN 'pending_retry' ELSE 'exhausted' END, \
                 run_at = CASE WHEN attempts + 1 < max_attempts \
                               THEN ?3 + MIN(backoff_base_secs << MIN(attempts, 20), ?4) \
                               ELSE run_at END, \
                 finished_at = CASE WHEN attempts + 1 < max_attempts \
                               THEN NULL ELSE ?3 END \
             WHERE id = ?1 \
             RETURNING status",
        )
        .bind(id.to_string())
        .bind(error)
        .bind(now)
        .bind(MAX_BACKOFF_SECS as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_err)?
        .ok_or(QueueError::NotFound)?;

        let status: String = row.try_get("status").map_err(backend_err)?;
        JobStatus::parse(&status)
            .ok_or_else(|| QueueError::Unavailable(format!("Invalid job status: {status}")))
    }

    async fn get_job(&self, id: JobId) -> Result<JobEntry, QueueError> {
        let query = format!("SELECT {ENTRY_COLUMNS} FROM jobs WHERE id = ?");
        let row = sqlx::query(&query)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_err)?
            .ok_or(QueueError::NotFound)?;

        entry_from_row(&row)
    }

    async fn get_status(&self, id: JobId) -> Result<JobStatus, QueueError> {
        let row = sqlx::query("SELECT status FROM jobs WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_err)?
            .ok_or(QueueError::NotFound)?;

        let status: String = row.try_get("status").map_err(backend_err)?;
        JobStatus::parse(&status)
            .ok_or_else(|| QueueError::Unavailable(format!("Invalid job status: {status}")))
    }

    async fn list_exhausted(&self, limit: u32) -> Result<Vec<JobEntry>, QueueError> {
        let query = format!(
            "SELECT {ENTRY_COLUMNS} FROM jobs WHERE status = 'exhausted' \
             ORDER BY finished_at DESC LIMIT ?"
        );
        let rows = sqlx::query(&query)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(backend_err)?;

        rows.iter().map(entry_from_row).collect()
    }

    async fn reclaim(&self, visibility: Duration) -> Result<u64, QueueError> {
        let now = ts(Utc::now());
        let cutoff = now - visibility.as_secs() as i64;

        let result = sqlx::query(
            "UPDATE jobs SET status = 'pending', locked_at = NULL, run_at = ? \
             WHERE status = 'active' AND (locked_at IS NULL OR locked_at <= ?)",
        )
        .bind(now)
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(backend_err)?;

        Ok(result.rows_affected())
    }

    async fn prune(&self, retention: RetentionPolicy) -> Result<u64, QueueError> {
        let now = ts(Utc::now());
        let completed_cutoff = now - retention.completed_max_age.as_secs() as i64;
        let exhausted_cutoff = now - retention.exhausted_max_age.as_secs() as i64;

        let result = sqlx::query(
            "DELETE FROM jobs WHERE finished_at IS NOT NULL AND ( \
                 (status = 'completed' AND finished_at <= ?) OR \
                 (status = 'exhausted' AND finished_at <= ?))",
        )
        .bind(completed_cutoff)
        .bind(exhausted_cutoff)
        .execute(&self.pool)
        .await
        .map_err(backend_err)?;

        Ok(result.rows_affected())
    }

    async fn pending_depth(&self) -> Result<u64, QueueError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS depth FROM jobs WHERE status IN ('pending', 'pending_retry')",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(backend_err)?;

        let depth: i64 = row.try_get("depth").map_err(backend_err)?;
        Ok(depth as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::{Database, SqliteConfig};
    use serde_json::json;

    async fn backend() -> SqliteQueueBackend {
        let db = Database::connect_with(SqliteConfig::memory()).await.unwrap();
        SqliteQueueBackend::new(db.pool().clone())
    }

    #[tokio::test]
    async fn test_enqueue_and_claim() {
        let queue = backend().await;
        let id = queue
            .enqueue("estimate", json!({"record_id": "r1"}), RetryPolicy::default())
            .await
            .unwrap();

        let job = queue.dequeue().await.unwrap().expect("job due");
        assert_eq!(job.id, id);
        assert_eq!(job.kind, "estimate");
        assert_eq!(job.status, JobStatus::Active);
        assert_eq!(job.payload["record_id"], "r1");
        assert_eq!(job.max_attempts, 5);
        assert!(job.locked_at.is_some());

        // Already claimed: nothing due
        assert!(queue.dequeue().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_claim_order_is_fifo() {
        let queue = backend().await;
        // created_at has second granularity; same-second ties break on id
        let mut ids = vec![
            queue
                .enqueue("a", json!({}), RetryPolicy::default())
                .await
                .unwrap(),
            queue
                .enqueue("b", json!({}), RetryPolicy::default())
                .await
                .unwrap(),
        ];
        ids.sort();

        let mut seen = vec![
            queue.dequeue().await.unwrap().unwrap().id,
            queue.dequeue().await.unwrap().unwrap().id,
        ];
        seen.sort();
        assert_eq!(seen, ids);
    }

    #[tokio::test]
    async fn test_ack_completes_idempotently() {
        let queue = backend().await;
        let id = queue
            .enqueue("estimate", json!({}), RetryPolicy::default())
            .await
            .unwrap();
        queue.dequeue().await.unwrap().unwrap();

        queue.ack(id).await.unwrap();
        queue.ack(id).await.unwrap();

        let job = queue.get_job(id).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.finished_at.is_some());
        assert!(job.locked_at.is_none());
    }

    #[tokio::test]
    async fn test_fail_schedules_backoff_then_exhausts() {
        let queue = backend().await;
        let policy = RetryPolicy {
            max_attempts: 2,
            backoff_base_secs: 60,
        };
        let id = queue.enqueue("estimate", json!({}), policy).await.unwrap();

        queue.dequeue().await.unwrap().unwrap();
        let status = queue.fail(id, "search exploded").await.unwrap();
        assert_eq!(status, JobStatus::PendingRetry);

        let job = queue.get_job(id).await.unwrap();
        assert_eq!(job.attempts, 1);
        assert_eq!(job.last_error.as_deref(), Some("search exploded"));
        // Backoff gate: 60s out, so not due now
        assert!(job.run_at > Utc::now());
        assert!(queue.dequeue().await.unwrap().is_none());

        // Force the retry due and exhaust it
        sqlx::query("UPDATE jobs SET run_at = 0 WHERE id = ?")
            .bind(id.to_string())
            .execute(&queue.pool)
            .await
            .unwrap();
        queue.dequeue().await.unwrap().unwrap();
        let status = queue.fail(id, "boom").await.unwrap();
        assert_eq!(status, JobStatus::Exhausted);

        assert!(queue.dequeue().await.unwrap().is_none());
        let dead = queue.list_exhausted(10).await.unwrap();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].attempts, 2);
    }

    #[tokio::test]
    async fn test_backoff_doubles_in_sql() {
        let queue = backend().await;
        let policy = RetryPolicy {
            max_attempts: 5,
            backoff_base_secs: 2,
        };
        let id = queue.enqueue("estimate", json!({}), policy).await.unwrap();

        for expected in [2i64, 4, 8] {
            sqlx::query("UPDATE jobs SET run_at = 0, status = 'pending', locked_at = NULL WHERE id = ?")
                .bind(id.to_string())
                .execute(&queue.pool)
                .await
                .unwrap();
            queue.dequeue().await.unwrap().unwrap();
            let before = Utc::now().timestamp();
            queue.fail(id, "boom").await.unwrap();
            let job = queue.get_job(id).await.unwrap();
            let delay = job.run_at.timestamp() - before;
            assert!(
                (delay - expected).abs() <= 1,
                "attempt delay {delay} != {expected}"
            );
        }
    }

    #[tokio::test]
    async fn test_reclaim_restores_stale_jobs() {
        let queue = backend().await;
        let id = queue
            .enqueue("estimate", json!({}), RetryPolicy::default())
            .await
            .unwrap();
        queue.dequeue().await.unwrap().unwrap();

        assert_eq!(queue.reclaim(Duration::from_secs(600)).await.unwrap(), 0);
        assert_eq!(queue.reclaim(Duration::from_secs(0)).await.unwrap(), 1);

        let job = queue.dequeue().await.unwrap().expect("redelivered");
        assert_eq!(job.id, id);
        assert_eq!(job.attempts, 0);
    }

    #[tokio::test]
    async fn test_prune_deletes_by_window() {
        let queue = backend().await;
        let done = queue
            .enqueue("estimate", json!({}), RetryPolicy::default())
            .await
            .unwrap();
        queue.dequeue().await.unwrap().unwrap();
        queue.ack(done).await.unwrap();

        let pruned = queue
            .prune(RetentionPolicy {
                completed_max_age: Duration::from_secs(0),
                exhausted_max_age: Duration::from_secs(3600),
            })
            .await
            .unwrap();
        assert_eq!(pruned, 1);
        assert!(matches!(
            queue.get_job(done).await,
            Err(QueueError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_no_concurrent_duplicate_delivery() {
        // In-memory SQLite is limited to one connection, so real dequeue
        // contention needs a file-backed pool.
        let path = std::env::temp_dir().join(format!("spindle-queue-{}.db", Uuid::new_v4()));
        let config = SqliteConfig {
            url: format!("sqlite:{}?mode=rwc", path.display()),
            max_connections: 8,
            ..Default::default()
        };
        let db = Database::connect_with(config).await.unwrap();
        let queue = std::sync::Arc::new(SqliteQueueBackend::new(db.pool().clone()));

        for _ in 0..50 {
            queue
                .enqueue("estimate", json!({}), RetryPolicy::default())
                .await
                .unwrap();
        }

        let mut handles = Vec::new();
        for _ in 0..8 {
            let queue = queue.clone();
            handles.push(tokio::spawn(async move {
                let mut seen = Vec::new();
                while let Some(job) = queue.dequeue().await.unwrap() {
                    seen.push(job.id);
                }
                seen
            }));
        }

        let mut all: Vec<Uuid> = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }
        all.sort();
        let len = all.len();
        all.dedup();
        assert_eq!(len, all.len(), "a job was delivered to two workers");
        assert_eq!(len, 50);

        db.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }
    }

    #[tokio::test]
    async fn test_pending_depth_counts_waiting_jobs() {
        let queue = backend().await;
        assert_eq!(queue.pending_depth().await.unwrap(), 0);
        queue
            .enqueue("a", json!({}), RetryPolicy::default())
            .await
            .unwrap();
        queue
            .enqueue("b", json!({}), RetryPolicy::default())
            .await
            .unwrap();
        assert_eq!(queue.pending_depth().await.unwrap(), 2);
        queue.dequeue().await.unwrap().unwrap();
        assert_eq!(queue.pending_depth().await.unwrap(), 1);
    }
}
