//! HTTP client for a Discogs-style pricing API

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::pace::Pacer;
use crate::source::{
    Candidate, CommunityCounts, PriceStats, PricingError, PricingSource, SearchPage, SearchQuery,
};

/// Default minimum gap between calls to the service.
pub const DEFAULT_CALL_GAP: Duration = Duration::from_millis(150);

#[derive(Debug, Clone)]
pub struct PricingConfig {
    /// API base URL (overridable for tests).
    pub base_url: String,
    /// Personal access token; sent as `Authorization: Discogs token=..`.
    pub token: Option<String>,
    /// The service rejects requests without a user agent.
    pub user_agent: String,
    pub min_call_gap: Duration,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.discogs.com".to_string(),
            token: None,
            user_agent: format!("spindle/{}", env!("CARGO_PKG_VERSION")),
            min_call_gap: DEFAULT_CALL_GAP,
        }
    }
}

/// Search response wire format
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<WireResult>,
    pagination: Option<WirePagination>,
}

#[derive(Debug, Deserialize)]
struct WirePagination {
    items: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct WireResult {
    id: Option<u64>,
    #[serde(rename = "type")]
    kind: Option<String>,
    title: Option<String>,
    country: Option<String>,
    year: Option<String>,
    /// The service reports labels as a list; the first one is kept.
    label: Option<Vec<String>>,
    catno: Option<String>,
    community: Option<WireCommunity>,
}

#[derive(Debug, Deserialize)]
struct WireCommunity {
    have: Option<u64>,
    want: Option<u64>,
}

/// Stats response wire format
#[derive(Debug, Deserialize)]
struct StatsResponse {
    lowest_price: Option<WirePrice>,
    num_for_sale: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct WirePrice {
    value: f64,
    currency: Option<String>,
}

/// Pricing source backed by the external HTTP API.
#[derive(Debug)]
pub struct HttpPricingSource {
    client: reqwest::Client,
    config: PricingConfig,
    pacer: Pacer,
}

impl HttpPricingSource {
    pub fn new(config: PricingConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            pacer: Pacer::new(config.min_call_gap),
            config,
        }
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let mut req = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, &self.config.user_agent);
        if let Some(token) = &self.config.token {
            req = req.header(
                reqwest::header::AUTHORIZATION,
                format!("Discogs token={token}"),
            );
        }
        req
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, PricingError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(PricingError::RequestFailed {
            status: status.as_u16(),
            message: message.chars().take(200).collect(),
        })
    }
}

#[async_trait]
impl PricingSource for HttpPricingSource {
    fn source_tag(&self) -> &str {
        "discogs"
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchPage, PricingError> {
        self.pacer.wait().await;

        let url = format!("{}/database/search", self.config.base_url);
        let mut params: Vec<(&str, &str)> = Vec::new();
        for (name, value) in [
            ("artist", &query.artist),
            ("release_title", &query.title),
            ("catno", &query.catno),
            ("barcode", &query.barcode),
        ] {
            if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                params.push((name, value));
            }
        }

        debug!(?params, "Pricing search");

        let response = self
            .request(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| PricingError::ConnectionFailed(e.to_string()))?;
        let body: SearchResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| PricingError::InvalidResponse(e.to_string()))?;

        let results = body
            .results
            .into_iter()
            .map(|r| Candidate {
                id: r.id,
                kind: r.kind.unwrap_or_default(),
                title: r.title,
                country: r.country,
                year: r.year,
                label: r.label.and_then(|mut labels| {
                    if labels.is_empty() {
                        None
                    } else {
                        Some(labels.remove(0))
                    }
                }),
                catno: r.catno,
                community: r.community.map(|c| CommunityCounts {
                    have: c.have.unwrap_or(0),
                    want: c.want.unwrap_or(0),
                }),
            })
            .collect::<Vec<_>>();

        let total = body
            .pagination
            .and_then(|p| p.items)
            .unwrap_or(results.len() as u64);

        Ok(SearchPage { results, total })
    }

    async fn stats(&self, release_id: u64) -> Result<PriceStats, PricingError> {
        self.pacer.wait().await;

        let url = format!(
            "{}/marketplace/stats/{}",
            self.config.base_url, release_id
        );

        let response = self
            .request(&url)
            .send()
            .await
            .map_err(|e| PricingError::ConnectionFailed(e.to_string()))?;
        let body: StatsResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| PricingError::InvalidResponse(e.to_string()))?;

        let (lowest_price, currency) = match body.lowest_price {
            Some(price) => (Some(price.value), price.currency),
            None => (None, None),
        };

        Ok(PriceStats {
            lowest_price,
            currency,
            num_for_sale: body.num_for_sale.unwrap_or(0),
        })
    }
}
