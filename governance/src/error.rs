use crate::proposal::ProposalId;
use estate_ledger::LedgerError;
use estate_types::Address;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GovernanceError {
    #[error("proposal {0} not found")]
    ProposalNotFound(ProposalId),

    #[error("insufficient proposal power: {have_bps} < {need_bps} basis points")]
    InsufficientProposalPower { have_bps: u128, need_bps: u32 },

    #[error("proposal description must not be empty")]
    EmptyDescription,

    #[error("proposal {0} is not accepting votes")]
    ProposalNotActive(ProposalId),

    #[error("{voter} has already voted on proposal {id}")]
    AlreadyVoted { id: ProposalId, voter: Address },

    #[error("{0} has no voting power")]
    NoVotingPower(Address),

    #[error("proposal {0} has not passed")]
    NotPassed(ProposalId),

    #[error("execution delay of proposal {id} has {remaining_secs}s left")]
    DelayNotElapsed { id: ProposalId, remaining_secs: u64 },

    #[error("proposal {0} is not executable")]
    NotExecutable(ProposalId),

    #[error("invalid governance parameters: {0}")]
    InvalidParams(String),

    #[error("arithmetic overflow in governance computation")]
    Overflow,

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("action dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),
}

/// Failure of the dispatched action itself. The proposal stays executable.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("target rejected the action: {0}")]
    Rejected(String),

    #[error("target unavailable: {0}")]
    Unavailable(String),
}
