//! Dispatch coordinator.
//!
//! [`DispatchCoordinator`] is the caller-facing entry point. Each operation
//! call returns immediately with a [`RequestId`]; the operation runs either
//! on the background executor or, when no executor is available, in the
//! caller's thread at the next scheduling tick. In both modes the callback
//! is invoked later, from [`process_events`](DispatchCoordinator::process_events)
//! or [`wait_idle`](DispatchCoordinator::wait_idle), and never from inside
//! the dispatching call.
//!
//! # Failure handling
//!
//! Filter, search and sort fail open: on error their callback receives the
//! original, unmodified input together with the error. Stats fail closed
//! and receive only the error.
//!
//! The coordinator switches to the same-thread fallback permanently when
//! the executor cannot be created or reports a runtime fault. Requests that
//! were in flight on a faulted executor are settled with
//! [`OffloadError::RuntimeFault`].
//!
//! # Example
//!
//! ```
//! use estate_offload::{DispatchCoordinator, FilterSpec, OffloadConfig, PriceRange, PropertyRecord};
//! use serde_json::json;
//! use std::time::Duration;
//!
//! let coordinator = DispatchCoordinator::new(OffloadConfig::default());
//!
//! let listings = vec![
//!     PropertyRecord::from_value(json!({"id": 1, "price": "150"})).unwrap(),
//!     PropertyRecord::from_value(json!({"id": 2, "price": 250})).unwrap(),
//! ];
//! let spec = FilterSpec::new().with_price_range(PriceRange::between(100.0, 200.0));
//!
//! coordinator.filter_properties(listings, spec, |kept, error| {
//!     assert!(error.is_none());
//!     assert_eq!(kept.len(), 1);
//! });
//!
//! assert!(coordinator.wait_idle(Duration::from_secs(5)));
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError, unbounded};
use estate_offload_ops::{
    FilterSpec, Operation, OperationKind, OperationOutput, PropertyRecord, PropertyStats, SortKey,
    SortOrder,
};
use parking_lot::Mutex;

use crate::config::{DeliveryPolicy, Isolation, OffloadConfig};
use crate::error::OffloadError;
use crate::executor::{BackgroundExecutor, ExecutorEvent, LibraryHandler, OperationHandler, SubmitError};
use crate::logging::{OperationSpan, Route, targets};
use crate::protocol::{RequestId, ResponseEnvelope, encode_request};
use crate::signal::Signal;
use crate::task::SharedTaskQueue;

/// Settles one pending request with its decoded result.
type Settle = Box<dyn FnOnce(Result<OperationOutput, OffloadError>) + Send + 'static>;

/// A fallback task's output: the request it belongs to and its result.
type FallbackOutcome = (RequestId, Result<OperationOutput, OffloadError>);

/// Snapshot of the coordinator's externally visible state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadyState {
    /// Whether operations are being routed to the background executor.
    pub executor_available: bool,
    /// Whether any request is still waiting for its callback.
    pub processing: bool,
}

/// One dispatched request awaiting its result.
struct PendingEntry {
    kind: OperationKind,
    route: Route,
    settle: Settle,
}

/// Pending requests, keyed by id.
struct PendingTable {
    entries: HashMap<RequestId, PendingEntry>,
    /// Most recent request per kind, tracked under
    /// [`DeliveryPolicy::LatestPerKind`].
    latest: HashMap<OperationKind, RequestId>,
    policy: DeliveryPolicy,
}

impl PendingTable {
    fn new(policy: DeliveryPolicy) -> Self {
        Self {
            entries: HashMap::new(),
            latest: HashMap::new(),
            policy,
        }
    }

    /// Register a request. Returns the entry it superseded, if any.
    fn register(&mut self, id: RequestId, entry: PendingEntry) -> Option<(RequestId, PendingEntry)> {
        let superseded = match self.policy {
            DeliveryPolicy::PerRequest => None,
            DeliveryPolicy::LatestPerKind => self
                .latest
                .insert(entry.kind, id)
                .and_then(|previous| self.entries.remove(&previous).map(|old| (previous, old))),
        };
        self.entries.insert(id, entry);
        superseded
    }

    fn take(&mut self, id: RequestId) -> Option<PendingEntry> {
        let entry = self.entries.remove(&id)?;
        if self.latest.get(&entry.kind) == Some(&id) {
            self.latest.remove(&entry.kind);
        }
        Some(entry)
    }

    fn kind_of(&self, id: RequestId) -> Option<OperationKind> {
        self.entries.get(&id).map(|entry| entry.kind)
    }

    fn reroute(&mut self, id: RequestId, route: Route) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.route = route;
        }
    }

    /// Remove every entry currently routed to `route`, in id order.
    fn take_routed(&mut self, route: Route) -> Vec<(RequestId, PendingEntry)> {
        let mut ids: Vec<RequestId> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.route == route)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids.into_iter()
            .filter_map(|id| self.take(id).map(|entry| (id, entry)))
            .collect()
    }

    fn clear(&mut self) -> Vec<PendingEntry> {
        self.latest.clear();
        self.entries.drain().map(|(_, entry)| entry).collect()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Routes property operations to a background executor, falling back to
/// deferred same-thread execution when the executor is unavailable.
///
/// The coordinator is `Send + Sync`. Callbacks run on whichever thread calls
/// [`process_events`](Self::process_events) or [`wait_idle`](Self::wait_idle),
/// outside of every internal lock, so a callback may dispatch further
/// requests. Those are delivered on a later tick.
pub struct DispatchCoordinator {
    config: OffloadConfig,
    /// `None` once the coordinator is in fallback mode.
    executor: Mutex<Option<BackgroundExecutor>>,
    events: Receiver<ExecutorEvent>,
    fallback: SharedTaskQueue<FallbackOutcome>,
    pending: Mutex<PendingTable>,
    next_id: AtomicU64,
    published: Mutex<ReadyState>,
    state_changed: Signal<ReadyState>,
}

impl DispatchCoordinator {
    /// Create a coordinator that runs the operation library.
    pub fn new(config: OffloadConfig) -> Self {
        Self::with_handler(config, Arc::new(LibraryHandler))
    }

    /// Create a coordinator whose executor runs operations through `handler`.
    ///
    /// Executor construction failure is not an error: the coordinator logs
    /// it and starts in fallback mode.
    pub fn with_handler(config: OffloadConfig, handler: Arc<dyn OperationHandler>) -> Self {
        let (events_tx, events_rx) = unbounded();
        let executor = match BackgroundExecutor::spawn(&config, handler, events_tx) {
            Ok(executor) => Some(executor),
            Err(err) => {
                tracing::warn!(
                    target: targets::COORDINATOR,
                    error = %err,
                    "background executor unavailable, using same-thread fallback"
                );
                None
            }
        };

        let initial = ReadyState {
            executor_available: executor.is_some(),
            processing: false,
        };

        Self {
            pending: Mutex::new(PendingTable::new(config.delivery)),
            config,
            executor: Mutex::new(executor),
            events: events_rx,
            fallback: SharedTaskQueue::new(),
            next_id: AtomicU64::new(1),
            published: Mutex::new(initial),
            state_changed: Signal::new(),
        }
    }

    /// The configuration this coordinator was created with.
    pub fn config(&self) -> &OffloadConfig {
        &self.config
    }

    /// Keep the records matching `filters`.
    ///
    /// On error the callback receives the original `properties` and the
    /// error.
    pub fn filter_properties<F>(
        &self,
        properties: Vec<PropertyRecord>,
        filters: FilterSpec,
        callback: F,
    ) -> RequestId
    where
        F: FnOnce(Vec<PropertyRecord>, Option<OffloadError>) + Send + 'static,
    {
        let settle = fail_open(properties.clone(), callback);
        self.dispatch(Operation::Filter { properties, filters }, settle)
    }

    /// Keep the records whose title, description or address contains
    /// `query`, ignoring case.
    ///
    /// On error the callback receives the original `properties` and the
    /// error.
    pub fn search_properties<F>(
        &self,
        properties: Vec<PropertyRecord>,
        query: impl Into<String>,
        callback: F,
    ) -> RequestId
    where
        F: FnOnce(Vec<PropertyRecord>, Option<OffloadError>) + Send + 'static,
    {
        let settle = fail_open(properties.clone(), callback);
        self.dispatch(
            Operation::Search {
                properties,
                query: query.into(),
            },
            settle,
        )
    }

    /// Stable-sort the records by `sort_by`.
    ///
    /// On error the callback receives the original `properties` and the
    /// error.
    pub fn sort_properties<F>(
        &self,
        properties: Vec<PropertyRecord>,
        sort_by: SortKey,
        sort_order: SortOrder,
        callback: F,
    ) -> RequestId
    where
        F: FnOnce(Vec<PropertyRecord>, Option<OffloadError>) + Send + 'static,
    {
        let settle = fail_open(properties.clone(), callback);
        self.dispatch(
            Operation::Sort {
                properties,
                sort_by,
                sort_order,
            },
            settle,
        )
    }

    /// Compute aggregate statistics. Fails closed.
    pub fn calculate_stats<F>(&self, properties: Vec<PropertyRecord>, callback: F) -> RequestId
    where
        F: FnOnce(Result<PropertyStats, OffloadError>) + Send + 'static,
    {
        let settle: Settle = Box::new(move |result| {
            callback(match result {
                Ok(OperationOutput::Stats(stats)) => Ok(stats),
                Ok(OperationOutput::Properties(_)) => Err(OffloadError::protocol(
                    "stats request answered with a property sequence",
                )),
                Err(err) => Err(err),
            })
        });
        self.dispatch(Operation::Stats { properties }, settle)
    }

    /// Whether operations are being routed to the background executor.
    pub fn is_ready(&self) -> bool {
        self.executor
            .lock()
            .as_ref()
            .is_some_and(BackgroundExecutor::is_running)
    }

    /// Whether any request is still waiting for its callback.
    pub fn is_processing(&self) -> bool {
        !self.pending.lock().is_empty()
    }

    /// Number of requests waiting for their callback.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Current ready state.
    pub fn state(&self) -> ReadyState {
        ReadyState {
            executor_available: self.is_ready(),
            processing: self.is_processing(),
        }
    }

    /// Signal emitted whenever either ready-state flag changes.
    ///
    /// Emission happens on the thread that caused the change: a dispatching
    /// thread, or the thread pumping [`process_events`](Self::process_events).
    pub fn on_state_changed(&self) -> &Signal<ReadyState> {
        &self.state_changed
    }

    /// Run one scheduling tick.
    ///
    /// Drains executor events, then runs the fallback tasks queued before
    /// this call. Returns the number of callbacks invoked.
    pub fn process_events(&self) -> usize {
        let mut settled = 0;

        loop {
            match self.events.try_recv() {
                Ok(event) => settled += self.handle_event(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    settled += self.handle_disconnect();
                    break;
                }
            }
        }

        let outcomes = self.fallback.run_tick();
        if !outcomes.is_empty() {
            tracing::trace!(
                target: targets::FALLBACK,
                count = outcomes.len(),
                "ran fallback tasks"
            );
        }
        for (id, result) in outcomes {
            if self.settle(id, result) {
                settled += 1;
            }
        }

        self.publish_state();
        settled
    }

    /// Pump [`process_events`](Self::process_events) until nothing is
    /// pending or `timeout` elapses.
    ///
    /// Returns `true` if the coordinator went idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        loop {
            self.process_events();
            if !self.is_processing() {
                return true;
            }

            let now = Instant::now();
            if deadline.is_some_and(|deadline| now >= deadline) {
                return false;
            }
            if self.fallback.has_pending() {
                continue;
            }

            let received = match deadline {
                Some(deadline) => self.events.recv_timeout(deadline - now),
                None => self.events.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match received {
                Ok(event) => {
                    self.handle_event(event);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    self.handle_disconnect();
                    thread::yield_now();
                }
            }
        }
    }

    /// Stop the executor and drop every pending callback without invoking it.
    ///
    /// The coordinator stays usable in fallback mode afterwards.
    pub fn shutdown(&self) {
        let executor = self.executor.lock().take();
        if let Some(executor) = executor {
            let clean = executor.shutdown();
            tracing::info!(target: targets::COORDINATOR, clean, "executor shut down");
        }

        let dropped = self.pending.lock().clear();
        let queued = self.fallback.pending_count();
        self.fallback.clear();
        if !dropped.is_empty() || queued > 0 {
            tracing::debug!(
                target: targets::COORDINATOR,
                dropped = dropped.len(),
                queued,
                "discarded pending requests"
            );
        }
        drop(dropped);
        self.publish_state();
    }

    fn next_request_id(&self) -> RequestId {
        RequestId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn dispatch(&self, operation: Operation, settle: Settle) -> RequestId {
        let id = self.next_request_id();
        let kind = operation.kind();
        let request = self.is_ready().then(|| encode_request(id, &operation));

        let guard = self.executor.lock();
        let executor = guard.as_ref().filter(|executor| executor.is_running());
        let route = if request.is_some() && executor.is_some() {
            Route::Executor
        } else {
            Route::Fallback
        };

        let superseded = self.pending.lock().register(id, PendingEntry { kind, route, settle });
        if let Some((previous, _)) = &superseded {
            tracing::debug!(
                target: targets::COORDINATOR,
                request = %previous,
                by = %id,
                %kind,
                "request superseded"
            );
        }

        let submitted = match (request, executor) {
            (Some(request), Some(executor)) => match executor.submit(request) {
                Ok(()) => true,
                Err(SubmitError::QueueFull) => {
                    tracing::warn!(
                        target: targets::COORDINATOR,
                        request = %id,
                        %kind,
                        capacity = self.config.queue_capacity,
                        "executor queue full, running request on the fallback path"
                    );
                    false
                }
                Err(SubmitError::Stopped) => {
                    tracing::debug!(target: targets::COORDINATOR, request = %id, "executor stopped, using fallback");
                    false
                }
            },
            _ => false,
        };
        drop(guard);
        drop(superseded);

        if submitted {
            tracing::trace!(target: targets::COORDINATOR, request = %id, %kind, "sent to executor");
        } else {
            if route == Route::Executor {
                self.pending.lock().reroute(id, Route::Fallback);
            }
            self.fallback.post(move || {
                let _span = OperationSpan::new(kind, Route::Fallback, id.as_u64());
                (id, Ok(operation.run()))
            });
            tracing::trace!(target: targets::FALLBACK, request = %id, %kind, "queued for next tick");
        }

        self.publish_state();
        id
    }

    /// Handle one executor event. Returns the number of callbacks invoked.
    fn handle_event(&self, event: ExecutorEvent) -> usize {
        match event {
            ExecutorEvent::Response(value) => {
                let envelope = match ResponseEnvelope::parse(value) {
                    Ok(envelope) => envelope,
                    Err(err) => {
                        tracing::error!(target: targets::COORDINATOR, error = %err, "discarding result");
                        return 0;
                    }
                };

                let id = envelope.id;
                let Some(kind) = self.pending.lock().kind_of(id) else {
                    tracing::trace!(
                        target: targets::COORDINATOR,
                        request = %id,
                        "no pending entry for result, discarding"
                    );
                    return 0;
                };
                usize::from(self.settle(id, envelope.into_output(kind)))
            }
            ExecutorEvent::Fault {
                request_id,
                message,
            } => {
                tracing::error!(
                    target: targets::COORDINATOR,
                    request = ?request_id.map(RequestId::as_u64),
                    reason = %message,
                    "executor fault, switching to same-thread fallback"
                );
                self.enter_fallback(message)
            }
        }
    }

    /// The executor dropped its event sender.
    fn handle_disconnect(&self) -> usize {
        if self.executor.lock().is_none() {
            return 0;
        }
        tracing::error!(
            target: targets::COORDINATOR,
            "executor exited unexpectedly, switching to same-thread fallback"
        );
        self.enter_fallback("executor exited unexpectedly".to_string())
    }

    /// Drop the executor for good and fail every request still routed to it.
    fn enter_fallback(&self, reason: String) -> usize {
        let executor = self.executor.lock().take();
        if let Some(executor) = executor {
            executor.shutdown();
        }

        let orphaned = self.pending.lock().take_routed(Route::Executor);
        let count = orphaned.len();
        for (id, entry) in orphaned {
            tracing::debug!(target: targets::COORDINATOR, request = %id, "settling with runtime fault");
            (entry.settle)(Err(OffloadError::RuntimeFault(reason.clone())));
        }
        self.publish_state();
        count
    }

    /// Invoke the callback for `id`, if it is still pending.
    fn settle(&self, id: RequestId, result: Result<OperationOutput, OffloadError>) -> bool {
        let entry = self.pending.lock().take(id);
        match entry {
            Some(entry) => {
                tracing::trace!(
                    target: targets::COORDINATOR,
                    request = %id,
                    kind = %entry.kind,
                    route = entry.route.as_str(),
                    ok = result.is_ok(),
                    "settling request"
                );
                (entry.settle)(result);
                true
            }
            None => {
                tracing::trace!(
                    target: targets::COORDINATOR,
                    request = %id,
                    "request already settled or superseded"
                );
                false
            }
        }
    }

    /// Emit `on_state_changed` if the state differs from the last emission.
    fn publish_state(&self) {
        let current = self.state();
        let changed = {
            let mut published = self.published.lock();
            if *published == current {
                false
            } else {
                *published = current;
                true
            }
        };
        if changed {
            tracing::debug!(
                target: targets::SIGNAL,
                executor_available = current.executor_available,
                processing = current.processing,
                "ready state changed"
            );
            self.state_changed.emit(current);
        }
    }
}

impl Default for DispatchCoordinator {
    fn default() -> Self {
        Self::new(OffloadConfig::default())
    }
}

impl Drop for DispatchCoordinator {
    fn drop(&mut self) {
        let pending = self.pending.get_mut().len();
        if pending > 0 {
            tracing::debug!(
                target: targets::COORDINATOR,
                pending,
                "coordinator dropped with requests in flight"
            );
        }
    }
}

/// Adapt a property-sequence callback to fail open with `original`.
fn fail_open<F>(original: Vec<PropertyRecord>, callback: F) -> Settle
where
    F: FnOnce(Vec<PropertyRecord>, Option<OffloadError>) + Send + 'static,
{
    Box::new(move |result| match result {
        Ok(OperationOutput::Properties(records)) => callback(records, None),
        Ok(OperationOutput::Stats(_)) => callback(
            original,
            Some(OffloadError::protocol(
                "property request answered with stats",
            )),
        ),
        Err(err) => callback(original, Some(err)),
    })
}

/// Builder for [`DispatchCoordinator`].
///
/// # Example
///
/// ```
/// use estate_offload::{CoordinatorBuilder, DeliveryPolicy};
///
/// let coordinator = CoordinatorBuilder::new()
///     .thread_name("listing-offload")
///     .queue_capacity(16)
///     .delivery(DeliveryPolicy::LatestPerKind)
///     .build();
/// ```
#[derive(Default)]
pub struct CoordinatorBuilder {
    config: OffloadConfig,
    handler: Option<Arc<dyn OperationHandler>>,
}

impl CoordinatorBuilder {
    /// Create a builder with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    pub fn config(mut self, config: OffloadConfig) -> Self {
        self.config = config;
        self
    }

    pub fn isolation(mut self, isolation: Isolation) -> Self {
        self.config.isolation = isolation;
        self
    }

    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.config.thread_name = name.into();
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    /// Capacity of the executor's request queue. Clamped to at least one.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity.max(1);
        self
    }

    pub fn delivery(mut self, delivery: DeliveryPolicy) -> Self {
        self.config.delivery = delivery;
        self
    }

    /// How long drop waits for the executor thread. Saturates at
    /// `u64::MAX` milliseconds.
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config.shutdown_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Run operations on the executor through `handler` instead of the
    /// operation library. The fallback path always runs the library.
    pub fn handler(mut self, handler: Arc<dyn OperationHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn build(self) -> DispatchCoordinator {
        let handler = self.handler.unwrap_or_else(|| Arc::new(LibraryHandler));
        DispatchCoordinator::with_handler(self.config, handler)
    }
}

static_assertions::assert_impl_all!(DispatchCoordinator: Send, Sync);
static_assertions::assert_impl_all!(ReadyState: Send, Sync, Copy);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn records(count: usize) -> Vec<PropertyRecord> {
        (0..count)
            .map(|i| PropertyRecord::new().with("id", i).with("price", (i * 10) as f64))
            .collect()
    }

    fn noop_entry(kind: OperationKind, route: Route) -> PendingEntry {
        PendingEntry {
            kind,
            route,
            settle: Box::new(|_| {}),
        }
    }

    #[test]
    fn test_builder_shutdown_timeout_saturates() {
        let builder = CoordinatorBuilder::new().shutdown_timeout(Duration::from_millis(750));
        assert_eq!(builder.config.shutdown_timeout_ms, 750);

        let builder = CoordinatorBuilder::new().shutdown_timeout(Duration::MAX);
        assert_eq!(builder.config.shutdown_timeout_ms, u64::MAX);
    }

    #[test]
    fn test_pending_table_per_request() {
        let mut table = PendingTable::new(DeliveryPolicy::PerRequest);
        assert!(table.register(RequestId::new(1), noop_entry(OperationKind::Filter, Route::Executor)).is_none());
        assert!(table.register(RequestId::new(2), noop_entry(OperationKind::Filter, Route::Executor)).is_none());
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_pending_table_latest_per_kind() {
        let mut table = PendingTable::new(DeliveryPolicy::LatestPerKind);
        table.register(RequestId::new(1), noop_entry(OperationKind::Filter, Route::Executor));
        table.register(RequestId::new(2), noop_entry(OperationKind::Sort, Route::Executor));

        let superseded = table.register(RequestId::new(3), noop_entry(OperationKind::Filter, Route::Executor));
        assert_eq!(superseded.map(|(id, _)| id), Some(RequestId::new(1)));
        assert_eq!(table.len(), 2);
        assert!(table.take(RequestId::new(1)).is_none());

        // Settling the latest clears the kind slot.
        assert!(table.take(RequestId::new(3)).is_some());
        assert!(table.register(RequestId::new(4), noop_entry(OperationKind::Filter, Route::Executor)).is_none());
    }

    #[test]
    fn test_take_routed() {
        let mut table = PendingTable::new(DeliveryPolicy::PerRequest);
        table.register(RequestId::new(3), noop_entry(OperationKind::Stats, Route::Executor));
        table.register(RequestId::new(1), noop_entry(OperationKind::Filter, Route::Executor));
        table.register(RequestId::new(2), noop_entry(OperationKind::Sort, Route::Fallback));

        let taken: Vec<u64> = table
            .take_routed(Route::Executor)
            .into_iter()
            .map(|(id, _)| id.as_u64())
            .collect();
        assert_eq!(taken, vec![1, 3]);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_request_ids_increase() {
        let coordinator = CoordinatorBuilder::new().isolation(Isolation::Unavailable).build();
        let first = coordinator.calculate_stats(Vec::new(), |_| {});
        let second = coordinator.calculate_stats(Vec::new(), |_| {});
        assert!(second > first);
    }

    #[test]
    fn test_fallback_defers_to_tick() {
        let coordinator = CoordinatorBuilder::new().isolation(Isolation::Unavailable).build();
        let calls = Arc::new(AtomicUsize::new(0));

        let calls_clone = calls.clone();
        coordinator.sort_properties(records(3), SortKey::Price, SortOrder::Desc, move |sorted, error| {
            assert!(error.is_none());
            assert_eq!(sorted[0].price(), 20.0);
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(coordinator.is_processing());
        assert_eq!(coordinator.process_events(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!coordinator.is_processing());
    }

    #[test]
    fn test_reentrant_dispatch_lands_on_later_tick() {
        let coordinator = Arc::new(CoordinatorBuilder::new().isolation(Isolation::Unavailable).build());
        let calls = Arc::new(AtomicUsize::new(0));

        let inner = coordinator.clone();
        let calls_clone = calls.clone();
        coordinator.calculate_stats(records(2), move |_| {
            let calls_inner = calls_clone.clone();
            calls_clone.fetch_add(1, Ordering::SeqCst);
            inner.calculate_stats(Vec::new(), move |_| {
                calls_inner.fetch_add(1, Ordering::SeqCst);
            });
        });

        assert_eq!(coordinator.process_events(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(coordinator.is_processing());
        assert_eq!(coordinator.process_events(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_shutdown_drops_callbacks() {
        let coordinator = CoordinatorBuilder::new().isolation(Isolation::Unavailable).build();
        let calls = Arc::new(AtomicUsize::new(0));

        let calls_clone = calls.clone();
        coordinator.calculate_stats(records(1), move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });
        coordinator.shutdown();

        assert_eq!(coordinator.process_events(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!coordinator.is_processing());
    }

    #[test]
    fn test_builder_clamps_capacity() {
        let builder = CoordinatorBuilder::new().queue_capacity(0);
        assert_eq!(builder.config.queue_capacity, 1);
    }
}
