//! Governance proposals and their lifecycle.

use estate_types::{Address, AssetId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Sequential proposal identifier, starting at 0.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ProposalId(u64);

impl ProposalId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state. Transitions only move forward:
/// `Active → Passed | Rejected`, `Passed → Executable → Executed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProposalState {
    /// Accepting votes until the voting deadline.
    Active,
    /// Won; waiting out the execution delay.
    Passed,
    /// Lost or tied. Terminal.
    Rejected,
    /// Delay elapsed; may be executed.
    Executable,
    /// Action dispatched successfully. Terminal.
    Executed,
}

impl fmt::Display for ProposalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Active => "active",
            Self::Passed => "passed",
            Self::Rejected => "rejected",
            Self::Executable => "executable",
            Self::Executed => "executed",
        };
        f.write_str(s)
    }
}

/// Result of a decided vote.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Rejected,
}

impl From<Outcome> for ProposalState {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Passed => Self::Passed,
            Outcome::Rejected => Self::Rejected,
        }
    }
}

/// Record of a proposal leaving the Active state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub id: ProposalId,
    pub outcome: Outcome,
    pub votes_for: u128,
    pub votes_against: u128,
    pub resolved_at: Timestamp,
    pub executable_at: Timestamp,
    pub short_circuit: bool,
}

/// What executing a proposal does: an opaque payload delivered to a target.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalAction {
    pub proposal: ProposalId,
    pub target: Address,
    pub payload: Vec<u8>,
}

impl fmt::Display for ProposalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} (0x{})", self.proposal, self.target, hex::encode(&self.payload))
    }
}

/// A governance proposal against one governance asset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub proposer: Address,
    pub description: String,
    pub target: Address,
    pub payload: Vec<u8>,
    /// Asset whose balances weigh the votes.
    pub governance_asset: AssetId,
    pub created_at: Timestamp,
    /// Last instant at which a vote is accepted.
    pub voting_deadline: Timestamp,
    pub execution_delay_secs: u64,
    pub votes_for: u128,
    pub votes_against: u128,
    pub voted: BTreeSet<Address>,
    pub state: ProposalState,
    pub resolved_at: Option<Timestamp>,
    pub executable_at: Option<Timestamp>,
    /// Total supply at creation, recorded when quorum is measured against a
    /// snapshot.
    pub supply_snapshot: Option<u128>,
    pub executed_at: Option<Timestamp>,
    pub executed_by: Option<Address>,
    /// A dispatch for this proposal is in flight. Never persisted.
    #[serde(skip)]
    pub(crate) executing: bool,
}

impl Proposal {
    pub fn total_votes(&self) -> u128 {
        self.votes_for.saturating_add(self.votes_against)
    }

    pub fn has_voted(&self, voter: &Address) -> bool {
        self.voted.contains(voter)
    }

    /// Whether a vote arriving at `now` may be counted.
    pub fn is_open(&self, now: Timestamp) -> bool {
        self.state == ProposalState::Active && now <= self.voting_deadline
    }

    pub fn action(&self) -> ProposalAction {
        ProposalAction {
            proposal: self.id,
            target: self.target.clone(),
            payload: self.payload.clone(),
        }
    }

    /// Apply the deadline transition if it is due at `now`.
    ///
    /// The natural outcome is derived only from stored tallies and the
    /// deadline, so it is the same whenever it is first observed: passed on a
    /// strict majority of votes cast, rejected otherwise (ties included).
    pub fn refresh(&mut self, now: Timestamp) -> Option<Resolution> {
        if self.state != ProposalState::Active || now <= self.voting_deadline {
            return None;
        }
        let outcome = if self.votes_for > self.votes_against {
            Outcome::Passed
        } else {
            Outcome::Rejected
        };
        Some(self.resolve(outcome, self.voting_deadline, false))
    }

    pub(crate) fn resolve(
        &mut self,
        outcome: Outcome,
        at: Timestamp,
        short_circuit: bool,
    ) -> Resolution {
        let executable_at = at.plus_secs(self.execution_delay_secs);
        self.state = outcome.into();
        self.resolved_at = Some(at);
        self.executable_at = Some(executable_at);
        Resolution {
            id: self.id,
            outcome,
            votes_for: self.votes_for,
            votes_against: self.votes_against,
            resolved_at: at,
            executable_at,
            short_circuit,
        }
    }
}
