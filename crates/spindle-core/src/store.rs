//! Storage seams consumed by the estimation pipeline

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::estimate::EstimationResult;
use crate::meta::SubjectRecord;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("Query failed: {0}")]
    Query(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Read-only access to catalogued records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch one record by id. `Ok(None)` means the record does not exist.
    async fn fetch(&self, id: Uuid) -> Result<Option<SubjectRecord>, StoreError>;
}

/// A persisted estimation snapshot with its storage metadata.
#[derive(Debug, Clone)]
pub struct StoredEstimate {
    pub id: Uuid,
    pub record_id: Uuid,
    pub result: EstimationResult,
    pub created_at: DateTime<Utc>,
}

/// Append-only persistence of estimation snapshots. Rows are never updated;
/// repeated estimations of the same record accumulate.
#[async_trait]
pub trait EstimateStore: Send + Sync {
    /// Append one snapshot for a record. Returns the snapshot id.
    async fn append(&self, record_id: Uuid, result: &EstimationResult) -> Result<Uuid, StoreError>;

    /// All snapshots for a record, oldest first.
    async fn list_for_record(&self, record_id: Uuid) -> Result<Vec<StoredEstimate>, StoreError>;
}
