//! Shared helpers for the coordinator integration tests.

#![allow(dead_code)]

use std::io;
use std::sync::{Arc, Mutex};

use estate_offload::{Operation, OperationOutput, OpsError, OperationHandler, PropertyRecord};
use serde_json::json;
use tracing_subscriber::EnvFilter;

/// Install a global test subscriber once. Honours `RUST_LOG`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("estate_offload=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// A `MakeWriter` target that appends formatted log lines to a buffer.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// The three-listing fixture with a numeric string, a junk string and a
/// plain number as prices.
pub fn mixed_price_listings() -> Vec<PropertyRecord> {
    [
        json!({"id": 1, "title": "Garden flat", "price": "150", "property_type": "apartment"}),
        json!({"id": 2, "title": "Loft", "price": "abc", "property_type": "apartment"}),
        json!({"id": 3, "title": "Cottage", "price": 250, "property_type": "house"}),
    ]
    .into_iter()
    .map(|value| PropertyRecord::from_value(value).unwrap())
    .collect()
}

/// Handler that panics on every operation.
pub struct PanickingHandler;

impl OperationHandler for PanickingHandler {
    fn handle(&self, operation: Operation) -> Result<OperationOutput, OpsError> {
        panic!("{} handler exploded", operation.kind());
    }
}

/// Handler that rejects every operation as invalid input.
pub struct RejectingHandler;

impl OperationHandler for RejectingHandler {
    fn handle(&self, operation: Operation) -> Result<OperationOutput, OpsError> {
        Err(OpsError::invalid_input(format!("{} rejected", operation.kind())))
    }
}
