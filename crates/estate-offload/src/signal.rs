//! Change notification for coordinator state.
//!
//! [`DispatchCoordinator::on_state_changed`](crate::DispatchCoordinator::on_state_changed)
//! hands out a [`Signal<ReadyState>`](crate::ReadyState). Listeners run
//! synchronously on the thread whose action changed the state.
//!
//! ```
//! use estate_offload::{CoordinatorBuilder, Isolation};
//!
//! let coordinator = CoordinatorBuilder::new()
//!     .isolation(Isolation::Unavailable)
//!     .build();
//!
//! let listener = coordinator.on_state_changed().connect(|state| {
//!     if state.processing {
//!         println!("showing spinner");
//!     }
//! });
//! coordinator.on_state_changed().disconnect(listener);
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

use crate::logging::targets;

new_key_type! {
    /// Handle for removing a listener from a [`Signal`].
    pub struct ConnectionId;
}

type Listener<Args> = Arc<dyn Fn(&Args) + Send + Sync>;

/// A set of listeners notified with a value of type `Args`.
///
/// Listeners are called in connection order, outside the listener lock, so
/// a listener may connect or disconnect others (including itself). Changes
/// made during an emission take effect from the next one.
pub struct Signal<Args> {
    listeners: Mutex<SlotMap<ConnectionId, Listener<Args>>>,
}

impl<Args> Default for Signal<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args> Signal<Args> {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(SlotMap::with_key()),
        }
    }

    /// Register a listener.
    pub fn connect<F>(&self, listener: F) -> ConnectionId
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        self.listeners.lock().insert(Arc::new(listener))
    }

    /// Register a listener for as long as the returned guard lives.
    pub fn connect_scoped<F>(&self, listener: F) -> ConnectionGuard<'_, Args>
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        let id = self.connect(listener);
        ConnectionGuard { signal: self, id }
    }

    /// Remove a listener. Returns `false` if it was already gone.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        self.listeners.lock().remove(id).is_some()
    }

    pub fn disconnect_all(&self) {
        self.listeners.lock().clear();
    }

    pub fn connection_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Notify every listener.
    pub fn emit(&self, args: Args) {
        let listeners: Vec<Listener<Args>> = self.listeners.lock().values().cloned().collect();
        if listeners.is_empty() {
            return;
        }
        tracing::trace!(target: targets::SIGNAL, listeners = listeners.len(), "notifying");
        for listener in &listeners {
            listener(&args);
        }
    }
}

/// Disconnects its listener on drop. See [`Signal::connect_scoped`].
pub struct ConnectionGuard<'a, Args> {
    signal: &'a Signal<Args>,
    id: ConnectionId,
}

impl<Args> ConnectionGuard<'_, Args> {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl<Args> Drop for ConnectionGuard<'_, Args> {
    fn drop(&mut self) {
        self.signal.disconnect(self.id);
    }
}
