//! SQLite pool setup and migrations

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::info;

use spindle_core::StoreError;

/// SQLite configuration options
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Database URL (e.g., "sqlite:spindle.db?mode=rwc" or "sqlite::memory:")
    pub url: String,
    pub max_connections: u32,
    /// WAL journal mode for better concurrency
    pub wal_mode: bool,
    pub foreign_keys: bool,
    pub busy_timeout_secs: u32,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:spindle.db?mode=rwc".to_string(),
            max_connections: 5,
            wal_mode: true,
            foreign_keys: true,
            busy_timeout_secs: 30,
        }
    }
}

impl SqliteConfig {
    /// In-memory database for tests. One connection: every connection to
    /// `:memory:` would otherwise get its own empty database.
    pub fn memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            wal_mode: false,
            foreign_keys: true,
            busy_timeout_secs: 5,
        }
    }
}

/// Owns the SQLite pool; stores borrow it via `pool()`.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let config = SqliteConfig {
            url: url.to_string(),
            ..Default::default()
        };
        Self::connect_with(config).await
    }

    pub async fn connect_with(config: SqliteConfig) -> Result<Self, StoreError> {
        let mut options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        if config.foreign_keys {
            options = options.pragma("foreign_keys", "ON");
        }
        options = options.pragma("busy_timeout", (config.busy_timeout_secs * 1000).to_string());
        if config.wal_mode {
            options = options.pragma("journal_mode", "WAL");
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Connection(format!("Migration failed: {e}")))?;

        info!(url = %config.url, wal = config.wal_mode, "Connected to SQLite");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn is_healthy(&self) -> bool {
        !self.pool.is_closed()
    }

    /// Release all connections; called on shutdown.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_database_migrates() {
        let db = Database::connect_with(SqliteConfig::memory()).await.unwrap();
        assert!(db.is_healthy().await);

        // Migrations must have created the three tables
        for table in ["records", "jobs", "estimates"] {
            let query = format!("SELECT COUNT(*) FROM {table}");
            sqlx::query(&query).fetch_one(db.pool()).await.unwrap();
        }

        db.close().await;
        assert!(!db.is_healthy().await);
    }
}
