//! Synchronous fan-out event bus.
//!
//! The rent ledger and the governance engine publish a record for every
//! state change (deposits, claims, proposal lifecycle). Listeners are invoked
//! inline on the emitting thread, after the emitter has released its own
//! entity locks; keep handlers fast.

use std::sync::RwLock;

type Listener<E> = Box<dyn Fn(&E) + Send + Sync>;

/// Fan-out bus for events of type `E`.
pub struct EventBus<E> {
    listeners: RwLock<Vec<Listener<E>>>,
}

impl<E> EventBus<E> {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn subscribe(&self, listener: impl Fn(&E) + Send + Sync + 'static) {
        self.listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(Box::new(listener));
    }

    pub fn emit(&self, event: &E) {
        let listeners = self.listeners.read().unwrap_or_else(|e| e.into_inner());
        for listener in listeners.iter() {
            listener(event);
        }
    }
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}
