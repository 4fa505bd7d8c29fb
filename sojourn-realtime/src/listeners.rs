//! Per-event listener registry.
//!
//! Listener registrations are application-level subscriptions, independent
//! of any particular transport connection: the registry lives on the
//! connection manager and is never cleared on reconnect.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use crate::events::ChannelEvent;

/// Callback handle for one event kind. Identity is the `Arc` allocation:
/// subscribing the same handle twice is a no-op, and removal goes by the
/// same reference equality.
pub type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

pub struct ListenerRegistry<E: ChannelEvent> {
    listeners: Mutex<HashMap<E::Kind, Vec<Listener<E>>>>,
}

impl<E: ChannelEvent> Default for ListenerRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ChannelEvent> ListenerRegistry<E> {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(HashMap::new()),
        }
    }

    /// Register a listener for `kind`. Idempotent per callback reference.
    pub fn subscribe(&self, kind: E::Kind, listener: Listener<E>) {
        let mut listeners = self.listeners.lock().expect("listener registry lock");
        let entry = listeners.entry(kind).or_default();
        if entry.iter().any(|existing| Arc::ptr_eq(existing, &listener)) {
            return;
        }
        entry.push(listener);
    }

    /// Remove a listener by reference equality. Unknown references are
    /// ignored.
    pub fn unsubscribe(&self, kind: E::Kind, listener: &Listener<E>) {
        let mut listeners = self.listeners.lock().expect("listener registry lock");
        if let Some(entry) = listeners.get_mut(&kind) {
            entry.retain(|existing| !Arc::ptr_eq(existing, listener));
        }
    }

    /// Invoke every listener registered for the event's kind, synchronously,
    /// in registration order. A panicking listener is logged and skipped;
    /// the rest still run.
    pub fn dispatch(&self, event: &E) {
        let snapshot = {
            let listeners = self.listeners.lock().expect("listener registry lock");
            listeners.get(&event.kind()).cloned().unwrap_or_default()
        };
        for listener in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                tracing::warn!(
                    kind = ?event.kind(),
                    "event listener panicked, continuing dispatch"
                );
            }
        }
    }

    /// Number of listeners registered for `kind`.
    pub fn count(&self, kind: E::Kind) -> usize {
        let listeners = self.listeners.lock().expect("listener registry lock");
        listeners.get(&kind).map_or(0, Vec::len)
    }
}
