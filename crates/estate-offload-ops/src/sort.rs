//! Listing sort.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::record::PropertyRecord;

/// The field listings are sorted by.
///
/// Unrecognized keys are kept verbatim so they survive a round trip, but
/// sort as "all equal", leaving the input order untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SortKey {
    /// Coerced numeric price.
    #[default]
    Price,
    /// Title, compared case-insensitively.
    Title,
    /// Any key without a comparator.
    Unrecognized(String),
}

impl SortKey {
    /// The wire spelling of this key.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Price => "price",
            Self::Title => "title",
            Self::Unrecognized(key) => key,
        }
    }

    fn known(key: &str) -> Option<Self> {
        match key {
            "price" => Some(Self::Price),
            "title" => Some(Self::Title),
            _ => None,
        }
    }

    fn compare(&self, a: &PropertyRecord, b: &PropertyRecord) -> Ordering {
        match self {
            Self::Price => a.price().total_cmp(&b.price()),
            Self::Title => a.title().to_lowercase().cmp(&b.title().to_lowercase()),
            Self::Unrecognized(_) => Ordering::Equal,
        }
    }
}

impl From<&str> for SortKey {
    fn from(key: &str) -> Self {
        Self::known(key).unwrap_or_else(|| Self::Unrecognized(key.to_string()))
    }
}

impl From<String> for SortKey {
    fn from(key: String) -> Self {
        Self::known(&key).unwrap_or(Self::Unrecognized(key))
    }
}

impl From<SortKey> for String {
    fn from(key: SortKey) -> Self {
        match key {
            SortKey::Unrecognized(key) => key,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sort direction. Anything other than `"desc"` reads as ascending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    /// The wire spelling of this order.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl From<&str> for SortOrder {
    fn from(order: &str) -> Self {
        if order == "desc" { Self::Desc } else { Self::Asc }
    }
}

impl From<String> for SortOrder {
    fn from(order: String) -> Self {
        Self::from(order.as_str())
    }
}

impl From<SortOrder> for String {
    fn from(order: SortOrder) -> Self {
        order.as_str().to_string()
    }
}

/// Return a sorted copy of `properties`.
///
/// The sort is stable in both directions: records with equal keys keep
/// their original relative order. The input is never reordered.
pub fn sort(properties: &[PropertyRecord], sort_by: &SortKey, order: SortOrder) -> Vec<PropertyRecord> {
    let mut sorted = properties.to_vec();
    if let SortKey::Unrecognized(key) = sort_by {
        tracing::debug!(target: "estate_offload_ops::sort", key = %key, "no comparator for sort key");
        return sorted;
    }

    match order {
        SortOrder::Asc => sorted.sort_by(|a, b| sort_by.compare(a, b)),
        SortOrder::Desc => sorted.sort_by(|a, b| sort_by.compare(a, b).reverse()),
    }
    sorted
}
