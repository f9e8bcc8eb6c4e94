//! The `estimate` job: record lookup, pipeline run, snapshot append

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use spindle_core::{EstimateStore, RecordStore};
use spindle_queue::{HandlerError, JobContext, JobHandler, JobId, QueueBackend, QueueError, RetryPolicy};

use crate::estimator::Estimator;

/// Job kind handled by [`EstimateHandler`].
pub const ESTIMATE_KIND: &str = "estimate";

#[derive(Debug, Serialize, Deserialize)]
struct EstimatePayload {
    record_id: Uuid,
}

/// Enqueue an estimation job for a record. This is the producer-facing
/// entrypoint; it returns as soon as the job is durably queued.
pub async fn enqueue_estimate<B: QueueBackend + ?Sized>(
    backend: &B,
    record_id: Uuid,
    policy: RetryPolicy,
) -> Result<JobId, QueueError> {
    let payload = serde_json::to_value(EstimatePayload { record_id })?;
    backend.enqueue(ESTIMATE_KIND, payload, policy).await
}

/// Handler executing the estimation pipeline for one record.
pub struct EstimateHandler {
    estimator: Estimator,
    records: Arc<dyn RecordStore>,
    estimates: Arc<dyn EstimateStore>,
}

impl EstimateHandler {
    pub fn new(
        estimator: Estimator,
        records: Arc<dyn RecordStore>,
        estimates: Arc<dyn EstimateStore>,
    ) -> Self {
        Self {
            estimator,
            records,
            estimates,
        }
    }
}

#[async_trait]
impl JobHandler for EstimateHandler {
    async fn run(&self, ctx: JobContext, payload: serde_json::Value) -> Result<(), HandlerError> {
        let payload: EstimatePayload = serde_json::from_value(payload)
            .map_err(|e| HandlerError::new(format!("Bad estimate payload: {e}")))?;

        let record = self
            .records
            .fetch(payload.record_id)
            .await
            .map_err(|e| HandlerError::new(format!("Record lookup failed: {e}")))?
            .ok_or_else(|| HandlerError::new(format!("Record not found: {}", payload.record_id)))?;

        let result = self
            .estimator
            .estimate(&record.meta)
            .await
            .map_err(|e| HandlerError::new(e.to_string()))?;

        let snapshot_id = self
            .estimates
            .append(record.id, &result)
            .await
            .map_err(|e| HandlerError::new(format!("Snapshot write failed: {e}")))?;

        info!(
            job_id = %ctx.job_id,
            record_id = %record.id,
            snapshot_id = %snapshot_id,
            estimated_price = ?result.estimated_price,
            "Estimation persisted"
        );

        Ok(())
    }
}
