//! Nullable dispatcher: record proposal actions without delivering them.

use estate_governance::{ActionDispatcher, DispatchError, ProposalAction};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Records every successfully dispatched action. Can be told to fail the next
/// `n` dispatches, or every dispatch.
#[derive(Default)]
pub struct NullDispatcher {
    dispatched: Mutex<Vec<ProposalAction>>,
    fail_next: AtomicUsize,
    fail_always: AtomicBool,
    attempts: AtomicUsize,
}

impl NullDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the next `n` dispatches.
    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_always.store(failing, Ordering::SeqCst);
    }

    /// Actions that were accepted, in order.
    pub fn dispatched(&self) -> Vec<ProposalAction> {
        self.dispatched
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Every dispatch call, accepted or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl ActionDispatcher for NullDispatcher {
    fn dispatch(&self, action: &ProposalAction) -> Result<(), DispatchError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_always.load(Ordering::SeqCst) {
            return Err(DispatchError::Unavailable(format!("{} is offline", action.target)));
        }
        let scheduled_failure = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if scheduled_failure {
            return Err(DispatchError::Rejected(format!("{} refused the call", action.target)));
        }
        self.dispatched
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(action.clone());
        Ok(())
    }
}
