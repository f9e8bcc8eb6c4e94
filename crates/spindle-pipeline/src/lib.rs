//! # Spindle Pipeline
//!
//! The estimation pipeline a worker executes for `estimate` jobs:
//! normalize metadata, search the pricing service, pick a candidate, fetch
//! marketplace stats, derive a price, persist one immutable snapshot.

pub mod estimator;
pub mod job;
pub mod normalizer;
pub mod select;

pub use estimator::{EstimateError, Estimator};
pub use job::{enqueue_estimate, EstimateHandler, ESTIMATE_KIND};
pub use normalizer::{HttpNormalizer, NormalizedText, Normalizer, NormalizerError};
pub use select::Selected;
