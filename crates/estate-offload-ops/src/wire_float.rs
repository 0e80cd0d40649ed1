//! JSON encoding for `f64` fields that may hold infinities or NaN.
//!
//! JSON numbers cannot carry non-finite values and `serde_json` writes them
//! as `null`. Fields using this module write finite values as plain numbers
//! and non-finite values as the strings `"Infinity"`, `"-Infinity"` and
//! `"NaN"`, and accept both forms when reading.
//!
//! ```ignore
//! #[serde(with = "crate::wire_float")]
//! pub total_price: f64,
//! #[serde(default, with = "crate::wire_float::option")]
//! pub min: Option<f64>,
//! ```

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serializer};

const INFINITY: &str = "Infinity";
const NEG_INFINITY: &str = "-Infinity";
const NAN: &str = "NaN";

#[derive(Deserialize)]
#[serde(untagged)]
enum Encoded {
    Number(f64),
    Text(String),
}

impl Encoded {
    fn decode<E: de::Error>(self) -> Result<f64, E> {
        match self {
            Self::Number(value) => Ok(value),
            Self::Text(text) => match text.as_str() {
                INFINITY => Ok(f64::INFINITY),
                NEG_INFINITY => Ok(f64::NEG_INFINITY),
                NAN => Ok(f64::NAN),
                other => Err(E::invalid_value(
                    de::Unexpected::Str(other),
                    &"a number, \"Infinity\", \"-Infinity\" or \"NaN\"",
                )),
            },
        }
    }
}

pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() {
        serializer.serialize_f64(*value)
    } else if value.is_nan() {
        serializer.serialize_str(NAN)
    } else if value.is_sign_positive() {
        serializer.serialize_str(INFINITY)
    } else {
        serializer.serialize_str(NEG_INFINITY)
    }
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Encoded::deserialize(deserializer)?.decode()
}

/// The same encoding for optional fields. `null` reads as `None`.
pub mod option {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(value) => super::serialize(value, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        Option::<Encoded>::deserialize(deserializer)?
            .map(Encoded::decode)
            .transpose()
    }
}
