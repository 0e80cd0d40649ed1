//! Logging facilities for the offload mechanism.
//!
//! Everything is instrumented with the `tracing` crate. The library never
//! installs a subscriber; applications choose their own:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("estate_offload=debug")
//!     .init();
//! ```
//!
//! Use the constants in [`targets`] to filter individual subsystems.

use estate_offload_ops::OperationKind;

/// Target names for log filtering.
pub mod targets {
    /// Dispatch, settlement and ready-state changes.
    pub const COORDINATOR: &str = "estate_offload::coordinator";
    /// Executor thread lifecycle and faults.
    pub const EXECUTOR: &str = "estate_offload::executor";
    /// Same-thread fallback execution.
    pub const FALLBACK: &str = "estate_offload::fallback";
    /// Ready-state signal emission.
    pub const SIGNAL: &str = "estate_offload::signal";
    /// Per-operation spans, on either execution path.
    pub const OPERATION: &str = "estate_offload::operation";
}

/// Where an operation ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// The background executor thread.
    Executor,
    /// The caller's thread, at the next scheduling tick.
    Fallback,
}

impl Route {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Executor => "executor",
            Self::Fallback => "fallback",
        }
    }
}

/// A guard that keeps a tracing span entered for the duration of one
/// operation.
#[derive(Debug)]
pub struct OperationSpan {
    #[allow(dead_code)]
    span: tracing::span::EnteredSpan,
}

impl OperationSpan {
    /// Enter a span for an operation of `kind` running on `route`.
    pub fn new(kind: OperationKind, route: Route, request_id: u64) -> Self {
        let span = tracing::debug_span!(
            target: targets::OPERATION,
            "operation",
            kind = kind.as_str(),
            route = route.as_str(),
            request_id
        );
        Self {
            span: span.entered(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_span_nests() {
        let _outer = OperationSpan::new(OperationKind::Filter, Route::Fallback, 1);
        let _inner = OperationSpan::new(OperationKind::Stats, Route::Executor, 2);
    }

    #[test]
    fn test_targets_share_crate_prefix() {
        for target in [
            targets::COORDINATOR,
            targets::EXECUTOR,
            targets::FALLBACK,
            targets::SIGNAL,
            targets::OPERATION,
        ] {
            assert!(target.starts_with("estate_offload::"), "{target}");
        }
    }

    #[test]
    fn test_route_names() {
        assert_eq!(Route::Executor.as_str(), "executor");
        assert_eq!(Route::Fallback.as_str(), "fallback");
    }
}
