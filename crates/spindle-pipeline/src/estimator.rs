//! The estimation pipeline
//!
//! Five sequential steps: normalize, search, select, stats, derive. Only a
//! search failure aborts the run; every other external dependency degrades to
//! a partial result, so "no price available" is a valid non-error outcome.

use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use spindle_core::{EstimationResult, ReleaseMeta};
use spindle_pricing::{PriceStats, PricingError, PricingSource, SearchPage, SearchQuery};

use crate::normalizer::Normalizer;
use crate::select::{select_candidate, Selected};

/// Listing-count threshold above which the market-depth uplift applies.
const DEPTH_THRESHOLD: u64 = 5;
/// Uplift factor applied when the market is deep enough.
const DEPTH_UPLIFT: f64 = 1.3;

#[derive(Debug, thiserror::Error)]
pub enum EstimateError {
    /// A failed search makes the whole estimate meaningless; it surfaces to
    /// the worker as a retryable job failure.
    #[error("Search failed: {0}")]
    Search(#[from] PricingError),
}

/// Orchestrates one estimation run against injected collaborators.
pub struct Estimator {
    source: Arc<dyn PricingSource>,
    normalizer: Option<Arc<dyn Normalizer>>,
}

impl Estimator {
    pub fn new(source: Arc<dyn PricingSource>, normalizer: Option<Arc<dyn Normalizer>>) -> Self {
        Self { source, normalizer }
    }

    pub async fn estimate(&self, meta: &ReleaseMeta) -> Result<EstimationResult, EstimateError> {
        // 1. Normalize. Best effort: unconfigured or failing normalizers
        //    leave the metadata exactly as it came in.
        let meta = match &self.normalizer {
            Some(normalizer) => match normalizer.normalize(meta).await {
                Ok(text) => text.apply(meta),
                Err(e) => {
                    debug!(error = %e, "Normalizer failed, using original metadata");
                    meta.clone()
                }
            },
            None => meta.clone(),
        };

        // 2. Search. An empty query is never sent; it counts as zero results.
        let query = SearchQuery {
            artist: meta.artist.clone(),
            title: meta.title.clone(),
            catno: meta.catno.clone(),
            barcode: meta.barcode.clone(),
        };
        let page = if meta.is_unsearchable() {
            SearchPage {
                results: Vec::new(),
                total: 0,
            }
        } else {
            self.source.search(&query).await?
        };

        // 3. Select.
        let Some(selected) = select_candidate(&page.results) else {
            return Ok(EstimationResult::empty(
                self.source.source_tag(),
                no_results_extras(&query, page.total),
            ));
        };

        // 4. Stats. Missing id or a failed call degrades to absent stats.
        let stats = match selected.candidate().id {
            Some(id) => match self.source.stats(id).await {
                Ok(stats) => Some(stats),
                Err(e) => {
                    warn!(release_id = id, error = %e, "Stats lookup failed, degrading to null prices");
                    None
                }
            },
            None => {
                debug!("Selected candidate has no id, skipping stats lookup");
                None
            }
        };

        // 5. Derive and assemble.
        let lowest_price = stats.as_ref().and_then(|s| s.lowest_price);
        let num_for_sale = stats.as_ref().map(|s| s.num_for_sale).unwrap_or(0);
        let estimated_price = derive_price(lowest_price, num_for_sale);

        Ok(EstimationResult {
            source: self.source.source_tag().to_string(),
            lowest_price,
            median_price: None,
            estimated_price,
            extras: candidate_extras(&selected, stats.as_ref()),
        })
    }
}

/// The pricing heuristic. With more than [`DEPTH_THRESHOLD`] active listings
/// the lowest ask gets a 30% uplift, rounded to cents; in a thin market the
/// lowest ask is taken as-is. No listings price means no estimate.
fn derive_price(lowest_price: Option<f64>, num_for_sale: u64) -> Option<f64> {
    let lowest = lowest_price?;
    if num_for_sale > DEPTH_THRESHOLD {
        Some(round2(lowest * DEPTH_UPLIFT))
    } else {
        Some(lowest)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn no_results_extras(query: &SearchQuery, total: u64) -> Map<String, Value> {
    let mut extras = Map::new();
    extras.insert("note".into(), json!("no results"));
    extras.insert("query".into(), json!(query));
    extras.insert("total_results".into(), json!(total));
    extras
}

fn candidate_extras(selected: &Selected, stats: Option<&PriceStats>) -> Map<String, Value> {
    let candidate = selected.candidate();
    let mut extras = Map::new();

    extras.insert("match".into(), json!(selected.match_kind()));
    if let Some(id) = candidate.id {
        extras.insert("release_id".into(), json!(id));
    }
    if let Some(title) = &candidate.title {
        extras.insert("title".into(), json!(title));
    }
    if let Some(country) = &candidate.country {
        extras.insert("country".into(), json!(country));
    }
    if let Some(year) = &candidate.year {
        extras.insert("year".into(), json!(year));
    }
    if let Some(label) = &candidate.label {
        extras.insert("label".into(), json!(label));
    }
    if let Some(catno) = &candidate.catno {
        extras.insert("catno".into(), json!(catno));
    }
    if let Some(community) = &candidate.community {
        extras.insert("have".into(), json!(community.have));
        extras.insert("want".into(), json!(community.want));
    }
    if let Some(stats) = stats {
        extras.insert("num_for_sale".into(), json!(stats.num_for_sale));
        if let Some(currency) = &stats.currency {
            extras.insert("currency".into(), json!(currency));
        }
    }

    extras
}
