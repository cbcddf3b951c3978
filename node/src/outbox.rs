//! Default action dispatcher of a node: executed proposal actions are queued
//! for an operator or relay to deliver to their targets.

use std::sync::Mutex;

use estate_governance::{ActionDispatcher, DispatchError, ProposalAction};
use tracing::info;

#[derive(Default)]
pub struct ActionOutbox {
    queue: Mutex<Vec<ProposalAction>>,
}

impl ActionOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Take every queued action, oldest first.
    pub fn drain(&self) -> Vec<ProposalAction> {
        std::mem::take(&mut *self.queue.lock().unwrap_or_else(|e| e.into_inner()))
    }

    /// Queued actions, oldest first, left in place.
    pub fn snapshot(&self) -> Vec<ProposalAction> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Replace the queue with `actions`.
    pub fn restore(&self, actions: Vec<ProposalAction>) {
        *self.queue.lock().unwrap_or_else(|e| e.into_inner()) = actions;
    }
}

impl ActionDispatcher for ActionOutbox {
    fn dispatch(&self, action: &ProposalAction) -> Result<(), DispatchError> {
        info!(%action, "proposal action queued");
        self.queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(action.clone());
        Ok(())
    }
}
