//! Message envelopes exchanged with the background executor.
//!
//! Requests and results cross the thread boundary as serialized JSON, so
//! the executor always works on its own copy of the data:
//!
//! ```text
//! request:  {"id": 7, "type": "FILTER", "data": {"properties": [...], "filters": {...}}}
//! success:  {"id": 7, "type": "FILTER", "data": [...]}
//! failure:  {"id": 7, "type": "FILTER", "error": {"kind": "InvalidInput", "message": "..."}}
//! ```
//!
//! Exactly one of `data` and `error` is present in a result.

use std::fmt;

use estate_offload_ops::{Operation, OperationKind, OperationOutput, OpsError};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::OffloadError;

/// Identifies one dispatched request until it settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(u64);

impl RequestId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw u64 value of this request ID.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Encode an operation as a request envelope.
pub fn encode_request(id: RequestId, operation: &Operation) -> Value {
    json!({
        "id": id,
        "type": operation.kind().as_str(),
        "data": operation.payload(),
    })
}

/// A request envelope with its payload still undecoded.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRequest {
    pub id: RequestId,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

impl RawRequest {
    /// Read the envelope fields, leaving the payload for [`Operation::decode`].
    pub fn parse(value: Value) -> Result<Self, OffloadError> {
        serde_json::from_value(value)
            .map_err(|err| OffloadError::protocol(format!("bad request envelope: {err}")))
    }

    /// Decode the payload into a typed operation.
    pub fn into_operation(self) -> Result<Operation, OpsError> {
        Operation::decode(&self.kind, self.data)
    }
}

/// A result envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub id: RequestId,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<OpsError>,
}

impl ResponseEnvelope {
    /// A successful result.
    pub fn success(id: RequestId, kind: &str, output: &OperationOutput) -> Self {
        Self {
            id,
            kind: kind.to_string(),
            data: Some(output.to_value()),
            error: None,
        }
    }

    /// A failed result.
    pub fn failure(id: RequestId, kind: &str, error: OpsError) -> Self {
        Self {
            id,
            kind: kind.to_string(),
            data: None,
            error: Some(error),
        }
    }

    /// Parse a result envelope received from the executor.
    pub fn parse(value: Value) -> Result<Self, OffloadError> {
        serde_json::from_value(value)
            .map_err(|err| OffloadError::protocol(format!("bad result envelope: {err}")))
    }

    /// Encode as a wire value.
    pub fn to_value(&self) -> Value {
        json!(self)
    }

    /// Decode the result for a request of kind `expected`.
    ///
    /// Fails with [`OffloadError::Protocol`] when the type tag does not match
    /// or the `data`/`error` exclusivity is violated.
    pub fn into_output(self, expected: OperationKind) -> Result<OperationOutput, OffloadError> {
        if self.kind != expected.as_str() {
            return Err(OffloadError::protocol(format!(
                "result {} tagged {} for a {expected} request",
                self.id, self.kind
            )));
        }
        match (self.data, self.error) {
            (Some(data), None) => Ok(OperationOutput::decode(expected, data)?),
            (None, Some(error)) => Err(error.into()),
            (Some(_), Some(_)) => Err(OffloadError::protocol(format!(
                "result {} carries both data and error",
                self.id
            ))),
            (None, None) => Err(OffloadError::protocol(format!(
                "result {} carries neither data nor error",
                self.id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use estate_offload_ops::{FilterSpec, PropertyRecord};

    fn stats_request() -> Operation {
        Operation::Stats {
            properties: vec![PropertyRecord::new().with("price", 10)],
        }
    }

    #[test]
    fn test_request_envelope() {
        let value = encode_request(RequestId::new(7), &stats_request());
        assert_eq!(value["id"], json!(7));
        assert_eq!(value["type"], json!("STATS"));

        let raw = RawRequest::parse(value).unwrap();
        assert_eq!(raw.id, RequestId::new(7));
        assert_eq!(raw.into_operation().unwrap(), stats_request());
    }

    #[test]
    fn test_request_without_id() {
        let err = RawRequest::parse(json!({"type": "STATS", "data": {}})).unwrap_err();
        assert!(matches!(err, OffloadError::Protocol(_)));
    }

    #[test]
    fn test_unknown_type_decodes_to_error() {
        let raw = RawRequest::parse(json!({"id": 1, "type": "TELEPORT"})).unwrap();
        assert_eq!(raw.into_operation().unwrap_err(), OpsError::unsupported("TELEPORT"));
    }

    #[test]
    fn test_success_envelope() {
        let operation = Operation::Filter {
            properties: vec![PropertyRecord::new().with("id", 1)],
            filters: FilterSpec::new(),
        };
        let output = operation.run();
        let envelope = ResponseEnvelope::success(RequestId::new(3), "FILTER", &output);
        let value = envelope.to_value();
        assert!(value.get("error").is_none());

        let parsed = ResponseEnvelope::parse(value).unwrap();
        assert_eq!(parsed.into_output(OperationKind::Filter).unwrap(), output);
    }

    #[test]
    fn test_failure_envelope() {
        let envelope =
            ResponseEnvelope::failure(RequestId::new(4), "SORT", OpsError::invalid_input("nope"));
        let value = envelope.to_value();
        assert!(value.get("data").is_none());

        let err = ResponseEnvelope::parse(value)
            .unwrap()
            .into_output(OperationKind::Sort)
            .unwrap_err();
        assert_eq!(err, OffloadError::Operation(OpsError::invalid_input("nope")));
    }

    #[test]
    fn test_exclusivity_enforced() {
        let both = ResponseEnvelope {
            id: RequestId::new(5),
            kind: "STATS".into(),
            data: Some(json!({})),
            error: Some(OpsError::invalid_input("x")),
        };
        assert!(matches!(
            both.into_output(OperationKind::Stats),
            Err(OffloadError::Protocol(_))
        ));

        let neither = ResponseEnvelope {
            id: RequestId::new(6),
            kind: "STATS".into(),
            data: None,
            error: None,
        };
        assert!(matches!(
            neither.into_output(OperationKind::Stats),
            Err(OffloadError::Protocol(_))
        ));
    }

    #[test]
    fn test_mismatched_kind() {
        let output = stats_request().run();
        let envelope = ResponseEnvelope::success(RequestId::new(8), "STATS", &output);
        assert!(matches!(
            envelope.into_output(OperationKind::Filter),
            Err(OffloadError::Protocol(_))
        ));
    }
}
