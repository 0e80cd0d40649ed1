//! Property listing records.
//!
//! A [`PropertyRecord`] is a loosely-typed JSON object. Listings come from a
//! hosted backend where fields are optional and prices sometimes arrive as
//! strings, so the record keeps every field it was given and exposes typed,
//! forgiving accessors for the handful of fields the operations read.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{OpsError, Result};

/// Well-known field names.
pub mod fields {
    /// Listing identifier.
    pub const ID: &str = "id";
    /// Listing headline.
    pub const TITLE: &str = "title";
    /// Free-form description.
    pub const DESCRIPTION: &str = "description";
    /// Street address.
    pub const ADDRESS: &str = "address";
    /// Asking price, numeric or string.
    pub const PRICE: &str = "price";
    /// Categorical property type ("house", "apartment", ...).
    pub const PROPERTY_TYPE: &str = "property_type";
}

/// Leading decimal number, the way a lenient float parser reads it.
static LEADING_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:[0-9]+\.?[0-9]*|\.[0-9]+)(?:[eE][+-]?[0-9]+)?")
        .expect("leading number pattern is valid")
});

/// A single property listing.
///
/// Records are never mutated by the operations in this crate. Filtering,
/// searching and sorting return new sequences of cloned records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyRecord(Map<String, Value>);

impl PropertyRecord {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from an arbitrary JSON value.
    ///
    /// Fails with [`OpsError::InvalidInput`] unless the value is an object.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(OpsError::invalid_input(format!(
                "property record must be an object, got {}",
                value_kind(&other)
            ))),
        }
    }

    /// Set a field, consuming and returning the record.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Get a raw field value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The listing identifier, if present.
    pub fn id(&self) -> Option<&Value> {
        self.get(fields::ID)
    }

    /// The listing title, empty when absent.
    pub fn title(&self) -> Cow<'_, str> {
        self.text(fields::TITLE)
    }

    /// The listing description, empty when absent.
    pub fn description(&self) -> Cow<'_, str> {
        self.text(fields::DESCRIPTION)
    }

    /// The listing address, empty when absent.
    pub fn address(&self) -> Cow<'_, str> {
        self.text(fields::ADDRESS)
    }

    /// The coerced numeric price. See [`coerce_price`].
    pub fn price(&self) -> f64 {
        self.get(fields::PRICE).map(coerce_price).unwrap_or(0.0)
    }

    /// The property type, if present and a string.
    pub fn property_type(&self) -> Option<&str> {
        self.get(fields::PROPERTY_TYPE).and_then(Value::as_str)
    }

    /// Read a field as text.
    ///
    /// Strings are returned as-is, numbers and booleans in their JSON
    /// rendering. Anything else reads as empty.
    pub fn text(&self, key: &str) -> Cow<'_, str> {
        match self.get(key) {
            Some(Value::String(s)) => Cow::Borrowed(s.as_str()),
            Some(Value::Number(n)) => Cow::Owned(n.to_string()),
            Some(Value::Bool(b)) => Cow::Owned(b.to_string()),
            _ => Cow::Borrowed(""),
        }
    }

    /// Borrow the underlying field map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Convert back into a JSON value.
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for PropertyRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Coerce a raw price value to a number.
///
/// Numbers are used directly. Strings contribute their leading decimal
/// number (`"150"` and `"150 sq"` both read as 150). Everything else,
/// including unparseable strings and non-finite results, is 0. Coercion
/// never fails.
pub fn coerce_price(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => LEADING_NUMBER
            .find(s.trim_start())
            .and_then(|m| m.as_str().parse::<f64>().ok()),
        _ => None,
    };
    parsed.filter(|p| p.is_finite()).unwrap_or(0.0)
}

/// Decode a JSON value into a property sequence.
///
/// Fails with [`OpsError::InvalidInput`] when the value is not an array or
/// any element is not an object.
pub fn decode_properties(value: Value) -> Result<Vec<PropertyRecord>> {
    let Value::Array(items) = value else {
        return Err(OpsError::invalid_input(format!(
            "properties must be a sequence, got {}",
            value_kind(&value)
        )));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            PropertyRecord::from_value(item).map_err(|_| {
                OpsError::invalid_input(format!("property at index {index} is not an object"))
            })
        })
        .collect()
}

pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "an object",
    }
}
