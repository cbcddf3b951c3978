//! Token-weighted governance for fractionalised assets.
//!
//! Lifecycle: Active → {Passed | Rejected} → Executable → Executed.
//!
//! - A holder whose share of supply meets the proposal threshold may open a
//!   proposal against one governance asset.
//! - Each holder votes once, weighted by its live balance. A strict majority
//!   of *total supply* on either side resolves the vote immediately; otherwise
//!   it resolves at the deadline by majority of votes cast, ties rejected.
//! - A passed proposal becomes executable after its execution delay and is
//!   executed at most once through an [`ActionDispatcher`].
//!
//! There is no background driver: time-based transitions are applied lazily
//! by every read and mutating call.

pub mod engine;
pub mod error;
pub mod events;
pub mod params;
pub mod proposal;
pub mod scheduler;
pub mod snapshot;
pub mod store;
pub mod tally;

pub use engine::GovernanceEngine;
pub use error::{DispatchError, GovernanceError};
pub use events::GovernanceEvent;
pub use params::{GovernanceParams, QuorumSupply, BPS_DENOMINATOR};
pub use proposal::{Outcome, Proposal, ProposalAction, ProposalId, ProposalState, Resolution};
pub use scheduler::{ActionDispatcher, ExecutionScheduler};
pub use snapshot::GovernanceSnapshot;
pub use store::{NewProposal, ProposalStore};
pub use tally::VoteReceipt;
