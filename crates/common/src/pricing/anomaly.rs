//! Anomaly Annotator - flags implausibly low prices within a result set

use crate::db::PriceMatch;
use serde::Serialize;

/// A price is suspicious when strictly below this share of the mean
pub const SUSPICIOUS_RATIO: f64 = 0.6;

/// Smaller result sets are never flagged
pub const MIN_SAMPLES: usize = 3;

/// A price match with its anomaly flag, serialized flat
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotatedPrice {
    #[serde(flatten)]
    pub price: PriceMatch,
    pub is_suspicious: bool,
}

/// One flag per input price, in order
pub fn flag_suspicious(prices: &[f64]) -> Vec<bool> {
    if prices.len() < MIN_SAMPLES {
        return vec![false; prices.len()];
    }

    let mean = prices.iter().sum::<f64>() / prices.len() as f64;
    let threshold = mean * SUSPICIOUS_RATIO;
    prices.iter().map(|&price| price < threshold).collect()
}

pub fn annotate(results: Vec<PriceMatch>) -> Vec<AnnotatedPrice> {
    let prices: Vec<f64> = results.iter().map(|r| r.record.price).collect();

    results
        .into_iter()
        .zip(flag_suspicious(&prices))
        .map(|(price, is_suspicious)| AnnotatedPrice {
            price,
            is_suspicious,
        })
        .collect()
}
