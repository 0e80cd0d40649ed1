//! Dedicated background executor for property operations.
//!
//! A [`BackgroundExecutor`] owns one named thread with a bounded request
//! queue. Requests arrive as serialized envelopes (see [`crate::protocol`]),
//! are decoded, run through an [`OperationHandler`], and answered with
//! exactly one result envelope on the event channel supplied at spawn time.
//!
//! # Faults
//!
//! A panic inside the handler is terminal. The executor reports an
//! [`ExecutorEvent::Fault`] naming the request it was working on and its
//! thread exits. The owner is expected to stop routing work here; the
//! executor never restarts itself.
//!
//! # Example
//!
//! ```no_run
//! use estate_offload::executor::{BackgroundExecutor, ExecutorEvent, LibraryHandler};
//! use estate_offload::OffloadConfig;
//! use std::sync::Arc;
//!
//! let (events_tx, events_rx) = crossbeam_channel::unbounded();
//! let executor = BackgroundExecutor::spawn(
//!     &OffloadConfig::default(),
//!     Arc::new(LibraryHandler),
//!     events_tx,
//! )?;
//!
//! executor.submit(serde_json::json!({
//!     "id": 1,
//!     "type": "STATS",
//!     "data": {"properties": [{"price": 100}]}
//! }))?;
//!
//! if let Ok(ExecutorEvent::Response(result)) = events_rx.recv() {
//!     println!("{result}");
//! }
//! executor.shutdown();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};
use estate_offload_ops::{Operation, OperationOutput, OpsError};
use parking_lot::{Condvar, Mutex};
use serde_json::Value;

use crate::config::{Isolation, OffloadConfig};
use crate::error::OffloadError;
use crate::logging::{OperationSpan, Route, targets};
use crate::protocol::{RawRequest, RequestId, ResponseEnvelope};

/// How often an idle executor re-checks for a stop request.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Runs decoded operations on the executor thread.
///
/// The default [`LibraryHandler`] runs the operation library. Other
/// implementations can wrap it with instrumentation, or inject faults in
/// tests.
pub trait OperationHandler: Send + Sync + 'static {
    fn handle(&self, operation: Operation) -> Result<OperationOutput, OpsError>;
}

/// Handler that runs the operation library directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct LibraryHandler;

impl OperationHandler for LibraryHandler {
    fn handle(&self, operation: Operation) -> Result<OperationOutput, OpsError> {
        Ok(operation.run())
    }
}

/// Messages emitted by the executor thread.
#[derive(Debug, Clone)]
pub enum ExecutorEvent {
    /// A result envelope for one request.
    Response(Value),
    /// The executor failed and has stopped. Terminal.
    Fault {
        request_id: Option<RequestId>,
        message: String,
    },
}

/// Why a request could not be queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    /// The request queue is at capacity.
    #[error("executor queue is full")]
    QueueFull,
    /// The executor has been stopped or its thread has exited.
    #[error("executor is not running")]
    Stopped,
}

/// Messages sent to the executor thread.
enum ExecutorMessage {
    Request(Value),
    Shutdown,
}

/// State shared between the executor handle and its thread.
struct ExecutorState {
    /// Whether new requests are accepted.
    accepting: AtomicBool,
    /// Whether the thread is still alive.
    alive: AtomicBool,
    /// Whether the thread exited because of a fault.
    faulted: AtomicBool,
    /// Requests queued or in progress.
    pending: AtomicUsize,
    shutdown_condvar: Condvar,
    shutdown_mutex: Mutex<()>,
}

impl ExecutorState {
    fn new() -> Self {
        Self {
            accepting: AtomicBool::new(true),
            alive: AtomicBool::new(true),
            faulted: AtomicBool::new(false),
            pending: AtomicUsize::new(0),
            shutdown_condvar: Condvar::new(),
            shutdown_mutex: Mutex::new(()),
        }
    }

    fn mark_exited(&self) {
        let _guard = self.shutdown_mutex.lock();
        self.alive.store(false, Ordering::Release);
        self.shutdown_condvar.notify_all();
    }
}

/// Handle to a dedicated executor thread.
///
/// Dropping the handle stops the thread and waits up to the configured
/// shutdown timeout for it to exit.
pub struct BackgroundExecutor {
    requests: Sender<ExecutorMessage>,
    handle: Mutex<Option<JoinHandle<()>>>,
    state: Arc<ExecutorState>,
    shutdown_timeout: Duration,
}

impl BackgroundExecutor {
    /// Start an executor thread.
    ///
    /// Results and faults are sent on `events`. The executor holds the only
    /// sender it is given, so the receiver observes a disconnect once the
    /// thread has exited.
    ///
    /// # Errors
    ///
    /// [`OffloadError::StartupUnavailable`] when isolation is configured
    /// unavailable or the thread cannot be spawned.
    pub fn spawn(
        config: &OffloadConfig,
        handler: Arc<dyn OperationHandler>,
        events: Sender<ExecutorEvent>,
    ) -> Result<Self, OffloadError> {
        if config.isolation == Isolation::Unavailable {
            return Err(OffloadError::StartupUnavailable(
                "no isolated execution context in this host".to_string(),
            ));
        }

        let (sender, receiver) = bounded(config.queue_capacity.max(1));
        let state = Arc::new(ExecutorState::new());
        let thread_state = state.clone();

        let mut builder = thread::Builder::new().name(config.thread_name.clone());
        if let Some(stack_size) = config.stack_size {
            builder = builder.stack_size(stack_size);
        }

        let handle = builder
            .spawn(move || {
                executor_loop(receiver, &thread_state, handler.as_ref(), &events);
                thread_state.mark_exited();
                tracing::debug!(target: targets::EXECUTOR, "executor thread exited");
            })
            .map_err(|err| {
                OffloadError::StartupUnavailable(format!("failed to spawn executor thread: {err}"))
            })?;

        tracing::info!(
            target: targets::EXECUTOR,
            thread = %config.thread_name,
            queue_capacity = config.queue_capacity,
            "background executor started"
        );

        Ok(Self {
            requests: sender,
            handle: Mutex::new(Some(handle)),
            state,
            shutdown_timeout: config.shutdown_timeout(),
        })
    }

    /// Whether the executor accepts requests and its thread is alive.
    pub fn is_running(&self) -> bool {
        self.state.accepting.load(Ordering::Acquire) && self.state.alive.load(Ordering::Acquire)
    }

    /// Whether the thread exited because of a fault.
    pub fn is_faulted(&self) -> bool {
        self.state.faulted.load(Ordering::Acquire)
    }

    /// Number of requests queued or in progress.
    pub fn pending_requests(&self) -> usize {
        self.state.pending.load(Ordering::Acquire)
    }

    /// Queue a request envelope without blocking.
    pub fn submit(&self, request: Value) -> Result<(), SubmitError> {
        if !self.is_running() {
            return Err(SubmitError::Stopped);
        }

        self.state.pending.fetch_add(1, Ordering::AcqRel);
        match self.requests.try_send(ExecutorMessage::Request(request)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.state.pending.fetch_sub(1, Ordering::AcqRel);
                Err(SubmitError::QueueFull)
            }
            Err(TrySendError::Disconnected(_)) => {
                self.state.pending.fetch_sub(1, Ordering::AcqRel);
                Err(SubmitError::Stopped)
            }
        }
    }

    /// Stop accepting requests and ask the thread to exit.
    ///
    /// Requests already queued ahead of the stop are still answered.
    /// Non-blocking; use [`join`](Self::join) or
    /// [`wait_timeout`](Self::wait_timeout) to wait for the thread.
    pub fn stop(&self) {
        self.state.accepting.store(false, Ordering::Release);
        let _ = self.requests.try_send(ExecutorMessage::Shutdown);
    }

    /// Wait for the thread to finish.
    ///
    /// Returns `true` if the thread was joined, `false` if it was already
    /// joined or panicked.
    pub fn join(&self) -> bool {
        let handle = self.handle.lock().take();
        match handle {
            Some(h) => h.join().is_ok(),
            None => false,
        }
    }

    /// Wait for the thread to exit, up to `timeout`.
    ///
    /// Returns `true` if the thread has exited.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        // A timeout too large for an `Instant` waits without a deadline.
        let deadline = Instant::now().checked_add(timeout);
        let mut guard = self.state.shutdown_mutex.lock();
        while self.state.alive.load(Ordering::Acquire) {
            let Some(deadline) = deadline else {
                self.state.shutdown_condvar.wait(&mut guard);
                continue;
            };
            if self
                .state
                .shutdown_condvar
                .wait_until(&mut guard, deadline)
                .timed_out()
            {
                return !self.state.alive.load(Ordering::Acquire);
            }
        }
        true
    }

    /// Stop the executor and wait up to the shutdown timeout for it.
    ///
    /// If the thread is still busy when the timeout elapses it is detached;
    /// it exits on its own once the current request finishes. Returns `true`
    /// if the thread exited in time.
    pub fn shutdown(&self) -> bool {
        self.stop();
        if self.wait_timeout(self.shutdown_timeout) {
            self.join();
            true
        } else {
            tracing::warn!(
                target: targets::EXECUTOR,
                timeout_ms = u64::try_from(self.shutdown_timeout.as_millis()).unwrap_or(u64::MAX),
                "executor did not stop in time, detaching thread"
            );
            drop(self.handle.lock().take());
            false
        }
    }
}

impl Drop for BackgroundExecutor {
    fn drop(&mut self) {
        if self.handle.lock().is_some() {
            self.shutdown();
        }
    }
}

/// Outcome of one request on the executor thread.
enum Processed {
    /// A result envelope to send back.
    Reply(Value),
    /// The request envelope was unreadable and has no id to answer.
    Dropped,
    /// The handler panicked.
    Faulted { request_id: RequestId, message: String },
}

/// The main executor loop.
fn executor_loop(
    receiver: Receiver<ExecutorMessage>,
    state: &ExecutorState,
    handler: &dyn OperationHandler,
    events: &Sender<ExecutorEvent>,
) {
    loop {
        match receiver.recv_timeout(POLL_INTERVAL) {
            Ok(ExecutorMessage::Request(request)) => {
                let processed = process_request(request, handler);
                state.pending.fetch_sub(1, Ordering::AcqRel);

                match processed {
                    Processed::Reply(envelope) => {
                        if events.send(ExecutorEvent::Response(envelope)).is_err() {
                            tracing::debug!(target: targets::EXECUTOR, "result receiver gone, exiting");
                            break;
                        }
                    }
                    Processed::Dropped => {}
                    Processed::Faulted {
                        request_id,
                        message,
                    } => {
                        tracing::error!(
                            target: targets::EXECUTOR,
                            request = %request_id,
                            panic = %message,
                            "operation panicked, executor stopping"
                        );
                        state.faulted.store(true, Ordering::Release);
                        state.accepting.store(false, Ordering::Release);
                        let _ = events.send(ExecutorEvent::Fault {
                            request_id: Some(request_id),
                            message,
                        });
                        break;
                    }
                }
            }
            Ok(ExecutorMessage::Shutdown) => break,
            Err(RecvTimeoutError::Timeout) => {
                if !state.accepting.load(Ordering::Acquire) && receiver.is_empty() {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

/// Decode, run and answer a single request envelope.
fn process_request(request: Value, handler: &dyn OperationHandler) -> Processed {
    let raw = match RawRequest::parse(request) {
        Ok(raw) => raw,
        Err(err) => {
            tracing::error!(target: targets::EXECUTOR, error = %err, "dropping unreadable request");
            return Processed::Dropped;
        }
    };

    let id = raw.id;
    let kind = raw.kind.clone();
    let operation = match raw.into_operation() {
        Ok(operation) => operation,
        Err(err) => {
            tracing::debug!(target: targets::EXECUTOR, request = %id, error = %err, "rejecting request");
            return Processed::Reply(ResponseEnvelope::failure(id, &kind, err).to_value());
        }
    };

    let _span = OperationSpan::new(operation.kind(), Route::Executor, id.as_u64());
    match panic::catch_unwind(AssertUnwindSafe(|| handler.handle(operation))) {
        Ok(Ok(output)) => Processed::Reply(ResponseEnvelope::success(id, &kind, &output).to_value()),
        Ok(Err(err)) => Processed::Reply(ResponseEnvelope::failure(id, &kind, err).to_value()),
        Err(payload) => Processed::Faulted {
            request_id: id,
            message: panic_message(payload.as_ref()),
        },
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "operation panicked".to_string()
    }
}

static_assertions::assert_impl_all!(BackgroundExecutor: Send, Sync);
