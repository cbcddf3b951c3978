//! Proposal lifecycle records.

use crate::proposal::{ProposalId, ProposalState};
use estate_types::{Address, Timestamp};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GovernanceEvent {
    ProposalCreated {
        id: ProposalId,
        proposer: Address,
        description: String,
    },
    VoteCast {
        id: ProposalId,
        voter: Address,
        support: bool,
        weight: u128,
    },
    ProposalResolved {
        id: ProposalId,
        state: ProposalState,
        votes_for: u128,
        votes_against: u128,
        /// Resolved by an irreversible majority before the deadline.
        short_circuit: bool,
        executable_at: Timestamp,
    },
    ProposalExecutable {
        id: ProposalId,
    },
    ProposalExecuted {
        id: ProposalId,
        executor: Address,
    },
    ExecutionFailed {
        id: ProposalId,
        reason: String,
    },
}
