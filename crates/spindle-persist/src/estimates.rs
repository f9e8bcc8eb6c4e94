//! Append-only estimation snapshot store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use spindle_core::{EstimateStore, EstimationResult, StoreError, StoredEstimate};

/// Snapshots are inserted once and never updated; history accumulates per
/// record in creation order.
pub struct SqliteEstimateStore {
    pool: SqlitePool,
}

impl SqliteEstimateStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn query_err(e: impl std::fmt::Display) -> StoreError {
    StoreError::Query(e.to_string())
}

#[async_trait]
impl EstimateStore for SqliteEstimateStore {
    async fn append(&self, record_id: Uuid, result: &EstimationResult) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        let extras = Value::Object(result.extras.clone());

        sqlx::query(
            "INSERT INTO estimates \
             (id, record_id, source, lowest_price, median_price, estimated_price, extras, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(record_id.to_string())
        .bind(&result.source)
        .bind(result.lowest_price)
        .bind(result.median_price)
        .bind(result.estimated_price)
        .bind(extras)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(query_err)?;

        Ok(id)
    }

    async fn list_for_record(&self, record_id: Uuid) -> Result<Vec<StoredEstimate>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, source, lowest_price, median_price, estimated_price, extras, created_at \
             FROM estimates WHERE record_id = ? ORDER BY created_at ASC, rowid ASC",
        )
        .bind(record_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(query_err)?;

        rows.into_iter()
            .map(|row| {
                let id: String = row.try_get("id").map_err(query_err)?;
                let id = Uuid::parse_str(&id)
                    .map_err(|_| StoreError::Query("Invalid estimate id".into()))?;
                let extras: Value = row.try_get("extras").map_err(query_err)?;
                let extras: Map<String, Value> = match extras {
                    Value::Object(map) => map,
                    _ => Map::new(),
                };
                let created_secs: i64 = row.try_get("created_at").map_err(query_err)?;

                Ok(StoredEstimate {
                    id,
                    record_id,
                    result: EstimationResult {
                        source: row.try_get("source").map_err(query_err)?,
                        lowest_price: row.try_get("lowest_price").map_err(query_err)?,
                        median_price: row.try_get("median_price").map_err(query_err)?,
                        estimated_price: row.try_get("estimated_price").map_err(query_err)?,
                        extras,
                    },
                    created_at: DateTime::from_timestamp(created_secs, 0).unwrap_or_default(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::SqliteRecordStore;
    use crate::sqlite::{Database, SqliteConfig};
    use serde_json::json;
    use spindle_core::{RecordStore, ReleaseMeta, SubjectRecord};

    async fn stores() -> (SqliteRecordStore, SqliteEstimateStore, Uuid) {
        let db = Database::connect_with(SqliteConfig::memory()).await.unwrap();
        let records = SqliteRecordStore::new(db.pool().clone());
        let estimates = SqliteEstimateStore::new(db.pool().clone());

        let record = SubjectRecord {
            id: Uuid::new_v4(),
            meta: ReleaseMeta {
                artist: Some("Artist A".into()),
                ..Default::default()
            },
        };
        records.insert(&record).await.unwrap();
        (records, estimates, record.id)
    }

    fn result(estimated: Option<f64>) -> EstimationResult {
        let mut extras = Map::new();
        extras.insert("num_for_sale".into(), json!(8));
        EstimationResult {
            source: "discogs".into(),
            lowest_price: estimated.map(|e| e / 1.3),
            median_price: None,
            estimated_price: estimated,
            extras,
        }
    }

    #[tokio::test]
    async fn test_snapshots_accumulate_in_order() {
        let (records, estimates, record_id) = stores().await;

        estimates.append(record_id, &result(Some(13.0))).await.unwrap();
        estimates.append(record_id, &result(None)).await.unwrap();

        let rows = estimates.list_for_record(record_id).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].result.estimated_price, Some(13.0));
        assert_eq!(rows[1].result.estimated_price, None);
        assert_eq!(rows[0].result.extras["num_for_sale"], 8);
        assert!(rows[0].created_at <= rows[1].created_at);

        // A record the pipeline never ran for has no rows
        assert!(records.fetch(record_id).await.unwrap().is_some());
        assert!(estimates
            .list_for_record(Uuid::new_v4())
            .await
            .unwrap()
            .is_empty());
    }
}
