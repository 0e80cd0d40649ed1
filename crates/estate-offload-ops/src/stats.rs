//! Aggregate listing statistics.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::record::PropertyRecord;

/// Bucket for records without a property type.
pub const UNSPECIFIED_TYPE: &str = "unspecified";

/// Aggregates over a property sequence.
///
/// Price aggregates use the same coerced prices as filtering and sorting.
/// The optional aggregates are absent for an empty input. Sums past
/// `f64::MAX` are infinite and stay so on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyStats {
    pub count: usize,
    #[serde(with = "crate::wire_float")]
    pub total_price: f64,
    #[serde(default, with = "crate::wire_float::option", skip_serializing_if = "Option::is_none")]
    pub average_price: Option<f64>,
    #[serde(default, with = "crate::wire_float::option", skip_serializing_if = "Option::is_none")]
    pub min_price: Option<f64>,
    #[serde(default, with = "crate::wire_float::option", skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,
    #[serde(default, with = "crate::wire_float::option", skip_serializing_if = "Option::is_none")]
    pub median_price: Option<f64>,
    #[serde(default)]
    pub by_type: BTreeMap<String, usize>,
}

impl PropertyStats {
    /// Whether the statistics were computed over an empty input.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Compute aggregate statistics.
pub fn stats(properties: &[PropertyRecord]) -> PropertyStats {
    let mut prices: Vec<f64> = properties.iter().map(PropertyRecord::price).collect();
    prices.sort_by(f64::total_cmp);

    let mut by_type = BTreeMap::new();
    for record in properties {
        let key = record.property_type().unwrap_or(UNSPECIFIED_TYPE);
        *by_type.entry(key.to_string()).or_insert(0) += 1;
    }

    let count = prices.len();
    let total_price: f64 = prices.iter().sum();

    PropertyStats {
        count,
        total_price,
        average_price: (count > 0).then(|| total_price / count as f64),
        min_price: prices.first().copied(),
        max_price: prices.last().copied(),
        median_price: median(&prices),
        by_type,
    }
}

/// Median of an already sorted slice.
fn median(sorted: &[f64]) -> Option<f64> {
    let mid = sorted.len() / 2;
    match sorted.len() {
        0 => None,
        n if n % 2 == 1 => Some(sorted[mid]),
        _ => Some((sorted[mid - 1] + sorted[mid]) / 2.0),
    }
}
