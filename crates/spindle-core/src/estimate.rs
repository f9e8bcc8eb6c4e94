//! Estimation snapshot types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One immutable estimation outcome for a subject record.
///
/// Invariant: `estimated_price` is `None` whenever `lowest_price` is `None`.
/// `median_price` is reserved for future data sources and stays `None` in the
/// current algorithm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimationResult {
    /// Provenance tag of the pricing data (external service name).
    pub source: String,
    pub lowest_price: Option<f64>,
    pub median_price: Option<f64>,
    pub estimated_price: Option<f64>,
    /// Auxiliary fields: matched-candidate identity, counts, locale/year/label
    /// info, or a diagnostic note when no candidate was found.
    pub extras: Map<String, Value>,
}

impl EstimationResult {
    /// A result with all price fields absent, carrying only extras.
    pub fn empty(source: &str, extras: Map<String, Value>) -> Self {
        Self {
            source: source.to_string(),
            lowest_price: None,
            median_price: None,
            estimated_price: None,
            extras,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_result_has_null_prices() {
        let mut extras = Map::new();
        extras.insert("note".into(), json!("no results"));
        let result = EstimationResult::empty("discogs", extras);
        assert!(result.lowest_price.is_none());
        assert!(result.median_price.is_none());
        assert!(result.estimated_price.is_none());
        assert_eq!(result.extras["note"], "no results");
    }

    #[test]
    fn test_round_trips_through_json() {
        let mut extras = Map::new();
        extras.insert("num_for_sale".into(), json!(8));
        let result = EstimationResult {
            source: "discogs".into(),
            lowest_price: Some(10.0),
            median_price: None,
            estimated_price: Some(13.0),
            extras,
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["median_price"], Value::Null);
        let back: EstimationResult = serde_json::from_value(value).unwrap();
        assert_eq!(back.estimated_price, Some(13.0));
    }
}
