//! Fire-once result channel.
//!
//! Coordinator callbacks run on whichever thread pumps
//! [`DispatchCoordinator::process_events`](crate::DispatchCoordinator::process_events).
//! When the code that wants the result lives on another thread, move an
//! [`OutcomeSender`] into the callback and wait on the paired
//! [`OutcomeReceiver`]:
//!
//! ```
//! use estate_offload::{CoordinatorBuilder, Isolation, outcome_pair};
//! use std::time::Duration;
//!
//! let coordinator = CoordinatorBuilder::new()
//!     .isolation(Isolation::Unavailable)
//!     .build();
//!
//! let (sender, receiver) = outcome_pair();
//! coordinator.calculate_stats(Vec::new(), move |result| sender.send(result));
//!
//! coordinator.wait_idle(Duration::from_secs(1));
//! let stats = receiver.try_take().unwrap().unwrap();
//! assert_eq!(stats.count, 0);
//! ```

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

struct OutcomeState<T> {
    value: Mutex<Slot<T>>,
    condvar: Condvar,
}

enum Slot<T> {
    Empty,
    Filled(T),
    Taken,
    Abandoned,
}

/// Sending half of an outcome channel. Consumed by [`send`](Self::send).
pub struct OutcomeSender<T> {
    inner: Arc<OutcomeState<T>>,
}

/// Receiving half of an outcome channel.
pub struct OutcomeReceiver<T> {
    inner: Arc<OutcomeState<T>>,
}

/// Create a fire-once sender/receiver pair.
pub fn outcome_pair<T>() -> (OutcomeSender<T>, OutcomeReceiver<T>) {
    let state = Arc::new(OutcomeState {
        value: Mutex::new(Slot::Empty),
        condvar: Condvar::new(),
    });
    (
        OutcomeSender {
            inner: state.clone(),
        },
        OutcomeReceiver { inner: state },
    )
}

impl<T> OutcomeSender<T> {
    /// Deliver the outcome and wake any waiter.
    pub fn send(self, value: T) {
        let mut slot = self.inner.value.lock();
        *slot = Slot::Filled(value);
        self.inner.condvar.notify_all();
    }
}

impl<T> Drop for OutcomeSender<T> {
    fn drop(&mut self) {
        let mut slot = self.inner.value.lock();
        if matches!(*slot, Slot::Empty) {
            *slot = Slot::Abandoned;
            self.inner.condvar.notify_all();
        }
    }
}

impl<T> OutcomeReceiver<T> {
    /// Take the outcome if it has arrived.
    pub fn try_take(&self) -> Option<T> {
        take(&mut self.inner.value.lock())
    }

    /// Whether the sender was dropped without sending.
    pub fn is_abandoned(&self) -> bool {
        matches!(*self.inner.value.lock(), Slot::Abandoned)
    }

    /// Block until the outcome arrives.
    ///
    /// Returns `None` if the sender is dropped without sending, which is
    /// what happens to a callback superseded under
    /// [`DeliveryPolicy::LatestPerKind`](crate::DeliveryPolicy::LatestPerKind)
    /// or discarded on shutdown.
    pub fn wait(self) -> Option<T> {
        let mut slot = self.inner.value.lock();
        while matches!(*slot, Slot::Empty) {
            self.inner.condvar.wait(&mut slot);
        }
        take(&mut slot)
    }

    /// Block until the outcome arrives or `timeout` elapses.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<T> {
        let mut slot = self.inner.value.lock();
        if matches!(*slot, Slot::Empty) {
            let _ = self.inner.condvar.wait_for(&mut slot, timeout);
        }
        take(&mut slot)
    }
}

fn take<T>(slot: &mut Slot<T>) -> Option<T> {
    match std::mem::replace(slot, Slot::Taken) {
        Slot::Filled(value) => Some(value),
        other => {
            *slot = other;
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_send_then_take() {
        let (sender, receiver) = outcome_pair();
        assert_eq!(receiver.try_take(), None);
        sender.send(7);
        assert_eq!(receiver.try_take(), Some(7));
        assert_eq!(receiver.try_take(), None);
    }

    #[test]
    fn test_wait_across_threads() {
        let (sender, receiver) = outcome_pair();

        let thread = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            sender.send("done".to_string());
        });

        assert_eq!(receiver.wait(), Some("done".to_string()));
        thread.join().unwrap();
    }

    #[test]
    fn test_dropped_sender_abandons() {
        let (sender, receiver) = outcome_pair::<i32>();
        drop(sender);
        assert!(receiver.is_abandoned());
        assert_eq!(receiver.wait(), None);
    }

    #[test]
    fn test_wait_timeout() {
        let (_sender, receiver) = outcome_pair::<i32>();
        assert_eq!(receiver.wait_timeout(Duration::from_millis(10)), None);
        assert!(!receiver.is_abandoned());
    }
}
