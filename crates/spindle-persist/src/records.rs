//! Catalogued record lookup

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use spindle_core::{RecordStore, ReleaseMeta, StoreError, SubjectRecord};

pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a record. The upload path owns record creation in production;
    /// this exists for seeding and tests.
    pub async fn insert(&self, record: &SubjectRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO records (id, artist, title, label, catno, barcode, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.id.to_string())
        .bind(&record.meta.artist)
        .bind(&record.meta.title)
        .bind(&record.meta.label)
        .bind(&record.meta.catno)
        .bind(&record.meta.barcode)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn fetch(&self, id: Uuid) -> Result<Option<SubjectRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT artist, title, label, catno, barcode FROM records WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        let Some(row) = row else { return Ok(None) };

        let meta = ReleaseMeta {
            artist: row.try_get("artist").map_err(|e| StoreError::Query(e.to_string()))?,
            title: row.try_get("title").map_err(|e| StoreError::Query(e.to_string()))?,
            label: row.try_get("label").map_err(|e| StoreError::Query(e.to_string()))?,
            catno: row.try_get("catno").map_err(|e| StoreError::Query(e.to_string()))?,
            barcode: row.try_get("barcode").map_err(|e| StoreError::Query(e.to_string()))?,
        };

        Ok(Some(SubjectRecord { id, meta }))
    }
}
