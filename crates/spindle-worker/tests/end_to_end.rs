//! Full-stack test: SQLite queue, worker pool, estimation pipeline and
//! snapshot store, with a scripted pricing source in place of the real API.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use spindle_core::{EstimateStore, ReleaseMeta, SubjectRecord};
use spindle_persist::{Database, SqliteConfig, SqliteEstimateStore, SqliteQueueBackend, SqliteRecordStore};
use spindle_pipeline::{enqueue_estimate, EstimateHandler, Estimator};
use spindle_pricing::{MockPricingSource, PriceStats};
use spindle_queue::{JobStatus, QueueBackend, RetryPolicy, WorkerConfig, WorkerPool};

fn fast_config() -> WorkerConfig {
    WorkerConfig {
        concurrency: 3,
        poll_interval: Duration::from_millis(10),
        housekeeping_interval: Duration::from_secs(60),
        ..WorkerConfig::default()
    }
}

async fn wait_terminal(queue: &SqliteQueueBackend, id: spindle_queue::JobId) -> JobStatus {
    for _ in 0..500 {
        let status = queue.get_status(id).await.unwrap();
        if status.is_terminal() {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job never reached a terminal state");
}

#[tokio::test]
async fn test_estimate_job_end_to_end() {
    let db = Database::connect_with(SqliteConfig::memory()).await.unwrap();
    let records = SqliteRecordStore::new(db.pool().clone());
    let estimates = Arc::new(SqliteEstimateStore::new(db.pool().clone()));
    let queue = Arc::new(SqliteQueueBackend::new(db.pool().clone()));

    let record = SubjectRecord {
        id: Uuid::new_v4(),
        meta: ReleaseMeta {
            artist: Some("Artist A".into()),
            title: Some("Title B".into()),
            ..Default::default()
        },
    };
    records.insert(&record).await.unwrap();

    let source = MockPricingSource::new()
        .with_results(vec![MockPricingSource::release(42, "Artist A - Title B")])
        .with_stats(PriceStats {
            lowest_price: Some(10.0),
            currency: Some("USD".into()),
            num_for_sale: 8,
        });
    let handler = EstimateHandler::new(
        Estimator::new(Arc::new(source), None),
        Arc::new(records),
        estimates.clone(),
    );

    let pool = Arc::new(WorkerPool::new_with_arc(queue.clone(), fast_config()));
    pool.register(spindle_pipeline::ESTIMATE_KIND, Arc::new(handler)).await;

    let job_id = enqueue_estimate(queue.as_ref(), record.id, RetryPolicy::default())
        .await
        .unwrap();

    let runner = tokio::spawn({
        let pool = pool.clone();
        async move { pool.start().await }
    });

    assert_eq!(wait_terminal(&queue, job_id).await, JobStatus::Completed);

    let rows = estimates.list_for_record(record.id).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].result.lowest_price, Some(10.0));
    assert_eq!(rows[0].result.estimated_price, Some(13.0));
    assert_eq!(rows[0].result.median_price, None);
    assert_eq!(rows[0].result.extras["release_id"], 42);
    runner.abort();
}

#[tokio::test]
async fn test_missing_record_exhausts_and_leaves_no_snapshot() {
    let db = Database::connect_with(SqliteConfig::memory()).await.unwrap();
    let records = SqliteRecordStore::new(db.pool().clone());
    let estimates = Arc::new(SqliteEstimateStore::new(db.pool().clone()));
    let queue = Arc::new(SqliteQueueBackend::new(db.pool().clone()));

    let source = MockPricingSource::new();
    let handler = EstimateHandler::new(
        Estimator::new(Arc::new(source), None),
        Arc::new(records),
        estimates.clone(),
    );

    let pool = Arc::new(WorkerPool::new_with_arc(queue.clone(), fast_config()));
    pool.register(spindle_pipeline::ESTIMATE_KIND, Arc::new(handler)).await;

    let ghost = Uuid::new_v4();
    let policy = RetryPolicy {
        max_attempts: 2,
        backoff_base_secs: 0,
    };
    let job_id = enqueue_estimate(queue.as_ref(), ghost, policy).await.unwrap();

    let runner = tokio::spawn({
        let pool = pool.clone();
        async move { pool.start().await }
    });

    assert_eq!(wait_terminal(&queue, job_id).await, JobStatus::Exhausted);

    let job = queue.get_job(job_id).await.unwrap();
    assert_eq!(job.attempts, 2);
    assert!(job.last_error.unwrap().contains("Record not found"));
    assert!(estimates.list_for_record(ghost).await.unwrap().is_empty());
    runner.abort();
}
