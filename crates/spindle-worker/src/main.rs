//! Spindle worker daemon
//!
//! Wires the SQLite queue, the pricing client and the estimation pipeline
//! together and runs the worker pool until interrupted. All dependencies are
//! constructed here and injected; nothing global.

mod config;

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use spindle_core::{EstimateStore, RecordStore};
use spindle_persist::{Database, SqliteConfig, SqliteEstimateStore, SqliteQueueBackend, SqliteRecordStore};
use spindle_pipeline::{EstimateHandler, Estimator, HttpNormalizer, Normalizer, ESTIMATE_KIND};
use spindle_pricing::{HttpPricingSource, PricingConfig};
use spindle_queue::{QueueBackend, WorkerConfig, WorkerPool};

use config::WorkerSettings;

fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,spindle_queue=debug,spindle_pipeline=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let settings = WorkerSettings::from_env();
    info!(concurrency = settings.concurrency, "Starting spindle worker");

    let db = Database::connect_with(SqliteConfig {
        url: settings.database_url.clone(),
        ..Default::default()
    })
    .await?;

    let records: Arc<dyn RecordStore> = Arc::new(SqliteRecordStore::new(db.pool().clone()));
    let estimates: Arc<dyn EstimateStore> = Arc::new(SqliteEstimateStore::new(db.pool().clone()));
    let queue: Arc<dyn QueueBackend> = Arc::new(SqliteQueueBackend::new(db.pool().clone()));

    let source = Arc::new(HttpPricingSource::new(PricingConfig {
        base_url: settings.pricing_url.clone(),
        token: settings.pricing_token.clone(),
        min_call_gap: settings.pricing_gap,
        ..Default::default()
    }));

    let normalizer: Option<Arc<dyn Normalizer>> = match &settings.normalizer_url {
        Some(url) => {
            info!(url = %url, "Metadata normalization enabled");
            Some(Arc::new(HttpNormalizer::new(url)))
        }
        None => {
            info!("No normalizer configured, metadata passes through unchanged");
            None
        }
    };

    let estimator = Estimator::new(source, normalizer);
    let handler = EstimateHandler::new(estimator, records, estimates);

    let pool = WorkerPool::new_with_arc(
        queue,
        WorkerConfig {
            concurrency: settings.concurrency,
            visibility_timeout: settings.visibility_timeout,
            ..Default::default()
        },
    );
    pool.register(ESTIMATE_KIND, Arc::new(handler)).await;

    tokio::select! {
        _ = pool.start() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    db.close().await;
    info!("Worker stopped");
    Ok(())
}
