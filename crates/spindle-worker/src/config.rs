//! Worker configuration
//!
//! Everything comes from environment variables; unset values fall back to
//! the defaults below.

use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// SQLite URL (env: SPINDLE_DATABASE_URL)
    pub database_url: String,
    /// Concurrent worker slots (env: SPINDLE_CONCURRENCY)
    pub concurrency: usize,
    /// Visibility timeout for abandoned jobs (env: SPINDLE_VISIBILITY_SECS)
    pub visibility_timeout: Duration,
    /// Pricing API base URL (env: SPINDLE_PRICING_URL)
    pub pricing_url: String,
    /// Pricing API token (env: SPINDLE_PRICING_TOKEN)
    pub pricing_token: Option<String>,
    /// Minimum gap between pricing calls (env: SPINDLE_PRICING_GAP_MS)
    pub pricing_gap: Duration,
    /// Normalizer endpoint; unset disables normalization
    /// (env: SPINDLE_NORMALIZER_URL)
    pub normalizer_url: Option<String>,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            database_url: "sqlite:spindle.db?mode=rwc".to_string(),
            concurrency: 3,
            visibility_timeout: Duration::from_secs(600),
            pricing_url: "https://api.discogs.com".to_string(),
            pricing_token: None,
            pricing_gap: Duration::from_millis(150),
            normalizer_url: None,
        }
    }
}

impl WorkerSettings {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            database_url: env::var("SPINDLE_DATABASE_URL").unwrap_or(defaults.database_url),
            concurrency: env::var("SPINDLE_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.concurrency),
            visibility_timeout: env::var("SPINDLE_VISIBILITY_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.visibility_timeout),
            pricing_url: env::var("SPINDLE_PRICING_URL").unwrap_or(defaults.pricing_url),
            pricing_token: env::var("SPINDLE_PRICING_TOKEN").ok(),
            pricing_gap: env::var("SPINDLE_PRICING_GAP_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.pricing_gap),
            normalizer_url: env::var("SPINDLE_NORMALIZER_URL").ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = WorkerSettings::default();
        assert_eq!(settings.concurrency, 3);
        assert_eq!(settings.pricing_gap, Duration::from_millis(150));
        assert!(settings.normalizer_url.is_none());
    }
}
