//! Background offload for property listing operations.
//!
//! This crate keeps filter, search, sort and stats work off the caller's
//! thread:
//!
//! - **Coordinator**: [`DispatchCoordinator`], the caller-facing API with
//!   callback delivery, fail-open error handling and ready-state tracking
//! - **Executor**: [`BackgroundExecutor`], a dedicated thread answering
//!   serialized requests
//! - **Fallback**: deferred same-thread execution when no executor exists
//! - **Signals**: [`Signal`] for ready-state change notification
//! - **Result channel**: [`outcome_pair`] for waiting on a callback from
//!   another thread
//! - **Configuration**: [`OffloadConfig`], loadable from TOML
//!
//! The operations themselves live in [`estate_offload_ops`] and are
//! re-exported here.
//!
//! # Example
//!
//! ```
//! use estate_offload::{DispatchCoordinator, OffloadConfig, PropertyRecord, SortKey, SortOrder};
//! use serde_json::json;
//! use std::time::Duration;
//!
//! let coordinator = DispatchCoordinator::new(OffloadConfig::default());
//! coordinator.on_state_changed().connect(|state| {
//!     println!("processing: {}", state.processing);
//! });
//!
//! let listings = vec![
//!     PropertyRecord::from_value(json!({"id": "a", "price": 320000})).unwrap(),
//!     PropertyRecord::from_value(json!({"id": "b", "price": "180000"})).unwrap(),
//! ];
//!
//! coordinator.sort_properties(listings, SortKey::Price, SortOrder::Desc, |sorted, error| {
//!     assert!(error.is_none());
//!     println!("{} listings sorted", sorted.len());
//! });
//!
//! // Callbacks run while the coordinator is pumped.
//! coordinator.wait_idle(Duration::from_secs(5));
//! ```

mod completion;
mod config;
mod coordinator;
mod error;
pub mod executor;
pub mod logging;
pub mod protocol;
pub mod signal;
mod task;

pub use completion::{OutcomeReceiver, OutcomeSender, outcome_pair};
pub use config::{
    DEFAULT_QUEUE_CAPACITY, DEFAULT_SHUTDOWN_TIMEOUT_MS, DEFAULT_THREAD_NAME, DeliveryPolicy,
    Isolation, OffloadConfig,
};
pub use coordinator::{CoordinatorBuilder, DispatchCoordinator, ReadyState};
pub use error::{ConfigError, OffloadError, Result};
pub use executor::{BackgroundExecutor, ExecutorEvent, LibraryHandler, OperationHandler, SubmitError};
pub use logging::OperationSpan;
pub use protocol::RequestId;
pub use signal::{ConnectionGuard, ConnectionId, Signal};

// Re-export the operation library
pub use estate_offload_ops::{
    ALL_TYPES, FilterSpec, Operation, OperationKind, OperationOutput, OpsError, PriceRange,
    PropertyRecord, PropertyStats, SortKey, SortOrder, UNSPECIFIED_TYPE,
};
