//! Typed operations and their wire payloads.
//!
//! An [`Operation`] bundles a property sequence with the parameters of one
//! of the four operation kinds. [`Operation::run`] is the single dispatch
//! point into the library, used both by the background executor and by the
//! same-thread fallback, so the two paths cannot drift apart.
//!
//! # Payload format
//!
//! | Kind     | Payload fields                                   |
//! |----------|--------------------------------------------------|
//! | `FILTER` | `properties`, `filters` (a [`FilterSpec`])       |
//! | `SEARCH` | `properties`, `query`                            |
//! | `SORT`   | `properties`, `sortBy`, `sortOrder`              |
//! | `STATS`  | `properties`                                     |

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::{OpsError, Result};
use crate::filter::{FilterSpec, filter};
use crate::record::{PropertyRecord, decode_properties, value_kind};
use crate::search::search;
use crate::sort::{SortKey, SortOrder, sort};
use crate::stats::{PropertyStats, stats};

/// The four operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationKind {
    Filter,
    Search,
    Sort,
    Stats,
}

impl OperationKind {
    /// All kinds, in declaration order.
    pub const ALL: [OperationKind; 4] = [Self::Filter, Self::Search, Self::Sort, Self::Stats];

    /// The wire spelling of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Filter => "FILTER",
            Self::Search => "SEARCH",
            Self::Sort => "SORT",
            Self::Stats => "STATS",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = OpsError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| OpsError::unsupported(s))
    }
}

/// A property operation with its input.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Filter {
        properties: Vec<PropertyRecord>,
        filters: FilterSpec,
    },
    Search {
        properties: Vec<PropertyRecord>,
        query: String,
    },
    Sort {
        properties: Vec<PropertyRecord>,
        sort_by: SortKey,
        sort_order: SortOrder,
    },
    Stats {
        properties: Vec<PropertyRecord>,
    },
}

/// The result of running an [`Operation`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OperationOutput {
    /// Filter, search and sort produce a property sequence.
    Properties(Vec<PropertyRecord>),
    /// Stats produce an aggregate.
    Stats(PropertyStats),
}

impl OperationOutput {
    /// Decode a wire result for the given kind.
    pub fn decode(kind: OperationKind, data: Value) -> Result<Self> {
        match kind {
            OperationKind::Stats => serde_json::from_value(data)
                .map(Self::Stats)
                .map_err(|err| OpsError::malformed(format!("stats result: {err}"))),
            _ => decode_properties(data).map(Self::Properties),
        }
    }

    /// Encode this output as a wire value.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Properties(records) => Value::Array(
                records
                    .iter()
                    .map(|record| Value::Object(record.as_map().clone()))
                    .collect(),
            ),
            Self::Stats(stats) => json!(stats),
        }
    }
}

impl Operation {
    /// The kind of this operation.
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Filter { .. } => OperationKind::Filter,
            Self::Search { .. } => OperationKind::Search,
            Self::Sort { .. } => OperationKind::Sort,
            Self::Stats { .. } => OperationKind::Stats,
        }
    }

    /// The input sequence.
    pub fn properties(&self) -> &[PropertyRecord] {
        match self {
            Self::Filter { properties, .. }
            | Self::Search { properties, .. }
            | Self::Sort { properties, .. }
            | Self::Stats { properties } => properties,
        }
    }

    /// Run the operation against the library.
    pub fn run(&self) -> OperationOutput {
        match self {
            Self::Filter {
                properties,
                filters,
            } => OperationOutput::Properties(filter(properties, filters)),
            Self::Search { properties, query } => {
                OperationOutput::Properties(search(properties, query))
            }
            Self::Sort {
                properties,
                sort_by,
                sort_order,
            } => OperationOutput::Properties(sort(properties, sort_by, *sort_order)),
            Self::Stats { properties } => OperationOutput::Stats(stats(properties)),
        }
    }

    /// Encode the payload half of a wire request.
    pub fn payload(&self) -> Value {
        let properties = OperationOutput::Properties(self.properties().to_vec()).to_value();
        match self {
            Self::Filter { filters, .. } => json!({
                "properties": properties,
                "filters": filters,
            }),
            Self::Search { query, .. } => json!({
                "properties": properties,
                "query": query,
            }),
            Self::Sort {
                sort_by,
                sort_order,
                ..
            } => json!({
                "properties": properties,
                "sortBy": sort_by,
                "sortOrder": sort_order,
            }),
            Self::Stats { .. } => json!({ "properties": properties }),
        }
    }

    /// Decode a wire request from its type tag and payload.
    ///
    /// # Errors
    ///
    /// - [`OpsError::UnsupportedOperation`] for an unknown type tag
    /// - [`OpsError::InvalidInput`] when the payload is not an object or
    ///   `properties` is missing or not a sequence of objects
    /// - [`OpsError::MalformedPayload`] when a kind-specific parameter has
    ///   the wrong shape
    pub fn decode(kind: &str, payload: Value) -> Result<Self> {
        let kind: OperationKind = kind.parse()?;
        let Value::Object(mut payload) = payload else {
            return Err(OpsError::invalid_input(format!(
                "{kind} payload must be an object, got {}",
                value_kind(&payload)
            )));
        };

        let properties = payload
            .remove("properties")
            .ok_or_else(|| OpsError::invalid_input(format!("{kind} payload has no properties")))
            .and_then(decode_properties)?;

        let operation = match kind {
            OperationKind::Filter => Self::Filter {
                properties,
                filters: field(&mut payload, "filters")?,
            },
            OperationKind::Search => Self::Search {
                properties,
                query: field::<Option<String>>(&mut payload, "query")?.unwrap_or_default(),
            },
            OperationKind::Sort => Self::Sort {
                properties,
                sort_by: field(&mut payload, "sortBy")?,
                sort_order: field(&mut payload, "sortOrder")?,
            },
            OperationKind::Stats => Self::Stats { properties },
        };
        Ok(operation)
    }
}

/// Take an optional parameter out of a payload, defaulting when absent or null.
fn field<T: DeserializeOwned + Default>(payload: &mut Map<String, Value>, name: &str) -> Result<T> {
    match payload.remove(name) {
        None | Some(Value::Null) => Ok(T::default()),
        Some(value) => serde_json::from_value(value)
            .map_err(|err| OpsError::malformed(format!("'{name}': {err}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::PriceRange;

    fn sample() -> Vec<PropertyRecord> {
        vec![
            PropertyRecord::new().with("id", 1).with("price", "150").with("title", "Cottage"),
            PropertyRecord::new().with("id", 2).with("price", 90).with("title", "Flat"),
        ]
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("FILTER".parse::<OperationKind>().unwrap(), OperationKind::Filter);
        assert_eq!("STATS".parse::<OperationKind>().unwrap(), OperationKind::Stats);
        assert_eq!(
            "filter".parse::<OperationKind>().unwrap_err(),
            OpsError::unsupported("filter")
        );
    }

    #[test]
    fn test_payload_decodes_back() {
        let operations = vec![
            Operation::Filter {
                properties: sample(),
                filters: FilterSpec::new().with_price_range(PriceRange::between(100.0, 200.0)),
            },
            Operation::Search {
                properties: sample(),
                query: "flat".into(),
            },
            Operation::Sort {
                properties: sample(),
                sort_by: SortKey::Price,
                sort_order: SortOrder::Desc,
            },
            Operation::Stats {
                properties: sample(),
            },
        ];

        for operation in operations {
            let kind = operation.kind();
            let decoded = Operation::decode(kind.as_str(), operation.payload()).unwrap();
            assert_eq!(decoded, operation);
        }
    }

    #[test]
    fn test_decode_defaults() {
        let payload = json!({"properties": [], "query": null});
        let decoded = Operation::decode("SEARCH", payload).unwrap();
        assert_eq!(
            decoded,
            Operation::Search {
                properties: vec![],
                query: String::new()
            }
        );

        let decoded = Operation::decode("SORT", json!({"properties": []})).unwrap();
        assert_eq!(
            decoded,
            Operation::Sort {
                properties: vec![],
                sort_by: SortKey::Price,
                sort_order: SortOrder::Asc
            }
        );
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(
            Operation::decode("TELEPORT", json!({"properties": []})),
            Err(OpsError::UnsupportedOperation(kind)) if kind == "TELEPORT"
        ));
        assert!(matches!(
            Operation::decode("FILTER", json!([1, 2])),
            Err(OpsError::InvalidInput(_))
        ));
        assert!(matches!(
            Operation::decode("FILTER", json!({"filters": {}})),
            Err(OpsError::InvalidInput(_))
        ));
        assert!(matches!(
            Operation::decode("STATS", json!({"properties": "lots"})),
            Err(OpsError::InvalidInput(_))
        ));
        assert!(matches!(
            Operation::decode("FILTER", json!({"properties": [], "filters": {"priceRange": "cheap"}})),
            Err(OpsError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_run_dispatches() {
        let operation = Operation::Filter {
            properties: sample(),
            filters: FilterSpec::new().with_price_range(PriceRange::at_least(100.0)),
        };
        let OperationOutput::Properties(kept) = operation.run() else {
            panic!("filter should produce properties");
        };
        assert_eq!(kept, vec![sample()[0].clone()]);

        let output = Operation::Stats { properties: sample() }.run();
        assert!(matches!(output, OperationOutput::Stats(s) if s.count == 2));
    }

    #[test]
    fn test_output_round_trip_per_kind() {
        let output = Operation::Stats { properties: sample() }.run();
        let decoded = OperationOutput::decode(OperationKind::Stats, output.to_value()).unwrap();
        assert_eq!(decoded, output);

        let err = OperationOutput::decode(OperationKind::Filter, json!({"count": 1})).unwrap_err();
        assert!(matches!(err, OpsError::InvalidInput(_)));
    }

    #[test]
    fn test_infinite_bounds_cross_the_wire() {
        for range in [
            PriceRange::at_least(f64::INFINITY),
            PriceRange::at_most(f64::NEG_INFINITY),
            PriceRange::between(f64::NEG_INFINITY, f64::INFINITY),
        ] {
            let operation = Operation::Filter {
                properties: sample(),
                filters: FilterSpec::new().with_price_range(range),
            };
            let decoded = Operation::decode("FILTER", operation.payload()).unwrap();
            assert_eq!(decoded, operation);
            assert_eq!(decoded.run(), operation.run());
        }

        let operation = Operation::Filter {
            properties: sample(),
            filters: FilterSpec::new().with_price_range(PriceRange::at_most(f64::NAN)),
        };
        let Operation::Filter { filters, .. } =
            Operation::decode("FILTER", operation.payload()).unwrap()
        else {
            panic!("filter should decode as a filter");
        };
        assert!(filters.price_range.and_then(|range| range.max).is_some_and(f64::is_nan));
        assert_eq!(
            Operation::Filter { properties: sample(), filters }.run(),
            OperationOutput::Properties(vec![])
        );
    }

    #[test]
    fn test_overflowing_stats_decode() {
        let properties = vec![
            PropertyRecord::new().with("price", 1e308),
            PropertyRecord::new().with("price", 1e308),
        ];
        let output = Operation::Stats { properties }.run();
        let decoded = OperationOutput::decode(OperationKind::Stats, output.to_value()).unwrap();

        let OperationOutput::Stats(stats) = &decoded else {
            panic!("stats should decode as stats");
        };
        assert_eq!(stats.total_price, f64::INFINITY);
        assert_eq!(stats.average_price, Some(f64::INFINITY));
        assert_eq!(stats.max_price, Some(1e308));
        assert_eq!(decoded, output);
    }
}
