//! Mock pricing source for testing

use async_trait::async_trait;
use std::sync::Mutex;

use crate::source::{
    Candidate, PriceStats, PricingError, PricingSource, SearchPage, SearchQuery,
};

/// Scripted pricing source. Records every search query it receives so tests
/// can assert on exactly what the pipeline sent.
#[derive(Debug, Default)]
pub struct MockPricingSource {
    results: Vec<Candidate>,
    total: Option<u64>,
    stats: Option<PriceStats>,
    fail_search: bool,
    fail_stats: bool,
    queries: Mutex<Vec<SearchQuery>>,
}

impl MockPricingSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return these candidates from every search.
    pub fn with_results(mut self, results: Vec<Candidate>) -> Self {
        self.total = Some(results.len() as u64);
        self.results = results;
        self
    }

    /// Override the reported total match count.
    pub fn with_total(mut self, total: u64) -> Self {
        self.total = Some(total);
        self
    }

    pub fn with_stats(mut self, stats: PriceStats) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Every search fails with a server error.
    pub fn failing_search(mut self) -> Self {
        self.fail_search = true;
        self
    }

    /// Every stats call fails with a server error.
    pub fn failing_stats(mut self) -> Self {
        self.fail_stats = true;
        self
    }

    /// Search queries received so far, in order.
    pub fn seen_queries(&self) -> Vec<SearchQuery> {
        self.queries.lock().unwrap().clone()
    }

    /// Convenience: a release candidate with the given id.
    pub fn release(id: u64, title: &str) -> Candidate {
        Candidate {
            id: Some(id),
            kind: "release".into(),
            title: Some(title.into()),
            country: None,
            year: None,
            label: None,
            catno: None,
            community: None,
        }
    }
}

#[async_trait]
impl PricingSource for MockPricingSource {
    fn source_tag(&self) -> &str {
        "mock"
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchPage, PricingError> {
        self.queries.lock().unwrap().push(query.clone());

        if self.fail_search {
            return Err(PricingError::RequestFailed {
                status: 500,
                message: "scripted search failure".into(),
            });
        }

        Ok(SearchPage {
            results: self.results.clone(),
            total: self.total.unwrap_or(self.results.len() as u64),
        })
    }

    async fn stats(&self, _release_id: u64) -> Result<PriceStats, PricingError> {
        if self.fail_stats {
            return Err(PricingError::RequestFailed {
                status: 500,
                message: "scripted stats failure".into(),
            });
        }

        self.stats
            .clone()
            .ok_or_else(|| PricingError::InvalidResponse("no scripted stats".into()))
    }
}
