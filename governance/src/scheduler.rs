//! Execution gating: the delay between resolution and execution, and at most
//! one successful dispatch per proposal.

use crate::error::{DispatchError, GovernanceError};
use crate::proposal::{Proposal, ProposalAction, ProposalState};
use crate::store::lock;
use estate_types::{Address, Timestamp};
use std::sync::{Arc, Mutex};

/// Delivers a proposal's action to its target.
pub trait ActionDispatcher: Send + Sync {
    fn dispatch(&self, action: &ProposalAction) -> Result<(), DispatchError>;
}

/// An execution claimed by [`ExecutionScheduler::begin`] whose dispatch is in
/// flight. Dropping it without [`ExecutionClaim::settled`] releases the claim,
/// so a dispatcher that unwinds leaves the proposal Executable.
pub(crate) struct ExecutionClaim<'a> {
    entry: &'a Mutex<Proposal>,
    armed: bool,
}

impl<'a> ExecutionClaim<'a> {
    pub(crate) fn new(entry: &'a Mutex<Proposal>) -> Self {
        Self { entry, armed: true }
    }

    /// The outcome was recorded by [`ExecutionScheduler::finish`].
    pub(crate) fn settled(mut self) {
        self.armed = false;
    }
}

impl Drop for ExecutionClaim<'_> {
    fn drop(&mut self) {
        if self.armed {
            lock(self.entry).executing = false;
        }
    }
}

pub struct ExecutionScheduler {
    dispatcher: Arc<dyn ActionDispatcher>,
}

impl ExecutionScheduler {
    pub fn new(dispatcher: Arc<dyn ActionDispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Move a Passed proposal to Executable once its delay has elapsed.
    pub fn make_executable(proposal: &mut Proposal, now: Timestamp) -> Result<(), GovernanceError> {
        if proposal.state != ProposalState::Passed {
            return Err(GovernanceError::NotPassed(proposal.id));
        }
        let executable_at = proposal.executable_at.unwrap_or(now);
        if now < executable_at {
            return Err(GovernanceError::DelayNotElapsed {
                id: proposal.id,
                remaining_secs: executable_at.as_secs() - now.as_secs(),
            });
        }
        proposal.state = ProposalState::Executable;
        Ok(())
    }

    /// Claim the proposal for execution and return the action to dispatch.
    ///
    /// While claimed, further attempts fail with `NotExecutable`. Every
    /// successful `begin` must be followed by [`ExecutionScheduler::finish`].
    pub fn begin(proposal: &mut Proposal) -> Result<ProposalAction, GovernanceError> {
        if proposal.state != ProposalState::Executable || proposal.executing {
            return Err(GovernanceError::NotExecutable(proposal.id));
        }
        proposal.executing = true;
        Ok(proposal.action())
    }

    /// Record the outcome of a dispatch started by [`ExecutionScheduler::begin`].
    pub fn finish(
        proposal: &mut Proposal,
        outcome: Result<(), DispatchError>,
        executor: &Address,
        now: Timestamp,
    ) -> Result<(), GovernanceError> {
        proposal.executing = false;
        outcome?;
        proposal.state = ProposalState::Executed;
        proposal.executed_at = Some(now);
        proposal.executed_by = Some(executor.clone());
        Ok(())
    }

    /// Deliver `action`. Must be called without the proposal's lock held.
    pub fn dispatch(&self, action: &ProposalAction) -> Result<(), DispatchError> {
        self.dispatcher.dispatch(action)
    }
}
