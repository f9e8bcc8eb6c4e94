//! # Spindle Pricing
//!
//! Client for the external pricing service: fuzzy catalogue search plus
//! per-release marketplace statistics, with a self-imposed minimum delay
//! between calls to respect the service's rate limit.

pub mod http;
pub mod mock;
pub mod pace;
pub mod source;

pub use http::{HttpPricingSource, PricingConfig};
pub use mock::MockPricingSource;
pub use pace::Pacer;
pub use source::{
    Candidate, CommunityCounts, PriceStats, PricingError, PricingSource, SearchPage, SearchQuery,
};
