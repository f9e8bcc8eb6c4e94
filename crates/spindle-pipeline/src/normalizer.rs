//! Metadata normalization pass
//!
//! An optional best-effort cleanup of noisy artist/title text before search.
//! Only artist and title may be rewritten; label, catalogue number and
//! barcode always pass through untouched. Any failure falls back to the
//! original metadata.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use spindle_core::ReleaseMeta;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NormalizerError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Request failed with status {0}")]
    RequestFailed(u16),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Rewritten artist/title pair. `None` means "leave the field as it was".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormalizedText {
    pub artist: Option<String>,
    pub title: Option<String>,
}

impl NormalizedText {
    /// Merge the rewrite into the original metadata. Only artist/title can
    /// change; everything else is carried over verbatim.
    pub fn apply(self, meta: &ReleaseMeta) -> ReleaseMeta {
        ReleaseMeta {
            artist: self.artist.or_else(|| meta.artist.clone()),
            title: self.title.or_else(|| meta.title.clone()),
            label: meta.label.clone(),
            catno: meta.catno.clone(),
            barcode: meta.barcode.clone(),
        }
    }
}

#[async_trait]
pub trait Normalizer: Send + Sync {
    async fn normalize(&self, meta: &ReleaseMeta) -> Result<NormalizedText, NormalizerError>;
}

/// Normalizer backed by an external cleanup endpoint. POSTs the raw metadata
/// and reads back a possibly-rewritten artist/title pair.
#[derive(Debug)]
pub struct HttpNormalizer {
    client: reqwest::Client,
    url: String,
}

impl HttpNormalizer {
    pub fn new(url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl Normalizer for HttpNormalizer {
    async fn normalize(&self, meta: &ReleaseMeta) -> Result<NormalizedText, NormalizerError> {
        let response = self
            .client
            .post(&self.url)
            .json(meta)
            .send()
            .await
            .map_err(|e| NormalizerError::ConnectionFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NormalizerError::RequestFailed(status.as_u16()));
        }

        response
            .json()
            .await
            .map_err(|e| NormalizerError::InvalidResponse(e.to_string()))
    }
}
