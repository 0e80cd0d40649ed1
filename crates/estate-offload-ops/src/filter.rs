//! Listing filters.

use serde::{Deserialize, Serialize};

use crate::record::PropertyRecord;

/// Property type value meaning "no constraint".
pub const ALL_TYPES: &str = "all";

/// Inclusive price bounds. An absent bound is unbounded.
///
/// Infinite and NaN bounds keep their value on the wire. A NaN bound
/// admits no price.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceRange {
    #[serde(with = "crate::wire_float::option", skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(with = "crate::wire_float::option", skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl PriceRange {
    /// Both bounds set.
    pub fn between(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    /// Lower bound only.
    pub fn at_least(min: f64) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    /// Upper bound only.
    pub fn at_most(max: f64) -> Self {
        Self {
            min: None,
            max: Some(max),
        }
    }

    /// Whether `price` lies within the bounds, both ends inclusive.
    pub fn contains(&self, price: f64) -> bool {
        self.min.is_none_or(|min| price >= min) && self.max.is_none_or(|max| price <= max)
    }
}

/// Filter configuration.
///
/// Only `priceRange` and `propertyType` are recognised. Unknown keys are
/// ignored when decoding so newer clients can send filters this version does
/// not understand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilterSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_range: Option<PriceRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_type: Option<String>,
}

impl FilterSpec {
    /// A filter with no constraints.
    pub fn new() -> Self {
        Self::default()
    }

    /// Constrain the price range.
    pub fn with_price_range(mut self, range: PriceRange) -> Self {
        self.price_range = Some(range);
        self
    }

    /// Constrain the property type. `"all"` removes the constraint.
    pub fn with_property_type(mut self, property_type: impl Into<String>) -> Self {
        self.property_type = Some(property_type.into());
        self
    }

    /// Whether this spec constrains anything at all.
    pub fn is_unconstrained(&self) -> bool {
        self.price_range.is_none() && self.type_constraint().is_none()
    }

    /// Whether a single record passes every present constraint.
    pub fn matches(&self, record: &PropertyRecord) -> bool {
        if let Some(range) = &self.price_range {
            if !range.contains(record.price()) {
                return false;
            }
        }
        if let Some(wanted) = self.type_constraint() {
            if record.property_type() != Some(wanted) {
                return false;
            }
        }
        true
    }

    fn type_constraint(&self) -> Option<&str> {
        self.property_type
            .as_deref()
            .filter(|property_type| *property_type != ALL_TYPES)
    }
}

/// Keep the records that satisfy every constraint present in `spec`.
pub fn filter(properties: &[PropertyRecord], spec: &FilterSpec) -> Vec<PropertyRecord> {
    if spec.is_unconstrained() {
        return properties.to_vec();
    }
    let kept: Vec<PropertyRecord> = properties
        .iter()
        .filter(|record| spec.matches(record))
        .cloned()
        .collect();
    tracing::trace!(
        target: "estate_offload_ops::filter",
        input = properties.len(),
        kept = kept.len(),
        "filtered properties"
    );
    kept
}
