//! Pricing source trait and common types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the external pricing service
#[derive(Debug, Error)]
pub enum PricingError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Request failed with status {status}: {message}")]
    RequestFailed { status: u16, message: String },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// A catalogue search constrained by whichever fields are present.
/// An entirely empty query must never be sent; callers skip the search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub artist: Option<String>,
    pub title: Option<String>,
    pub catno: Option<String>,
    pub barcode: Option<String>,
}

impl SearchQuery {
    pub fn is_empty(&self) -> bool {
        fn blank(f: &Option<String>) -> bool {
            f.as_deref().map(str::trim).unwrap_or("").is_empty()
        }
        blank(&self.artist) && blank(&self.title) && blank(&self.catno) && blank(&self.barcode)
    }
}

/// Community interest counts reported with a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunityCounts {
    pub have: u64,
    pub want: u64,
}

/// One search result: a possible matching catalogue item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    /// Identifier used for the stats lookup; absent for some entry types.
    pub id: Option<u64>,
    /// Type discriminator as reported by the service ("release", "master", ...).
    pub kind: String,
    pub title: Option<String>,
    pub country: Option<String>,
    pub year: Option<String>,
    pub label: Option<String>,
    pub catno: Option<String>,
    pub community: Option<CommunityCounts>,
}

impl Candidate {
    /// A concrete sellable release, as opposed to a master entry or an
    /// artist/label page.
    pub fn is_release(&self) -> bool {
        self.kind == "release"
    }
}

/// One page of search results plus the total match count the service reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchPage {
    pub results: Vec<Candidate>,
    pub total: u64,
}

/// Marketplace statistics for one release.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceStats {
    /// Lowest current asking price, if anything is listed.
    pub lowest_price: Option<f64>,
    pub currency: Option<String>,
    /// Count of active listings.
    pub num_for_sale: u64,
}

/// External pricing service: fuzzy search plus per-release stats.
#[async_trait]
pub trait PricingSource: Send + Sync {
    /// Provenance tag recorded on every estimation result.
    fn source_tag(&self) -> &str;

    async fn search(&self, query: &SearchQuery) -> Result<SearchPage, PricingError>;

    async fn stats(&self, release_id: u64) -> Result<PriceStats, PricingError>;
}
