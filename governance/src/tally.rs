//! Vote recording and short-circuit resolution.
//!
//! A side wins early only once it holds a strict majority of the *total*
//! quorum supply: at that point no distribution of the uncast supply can
//! overturn it. Majorities of votes cast are only decisive at the deadline
//! (see [`Proposal::refresh`]).

use crate::error::GovernanceError;
use crate::proposal::{Outcome, Proposal, ProposalId, Resolution};
use estate_ledger::Holding;
use estate_types::{Address, Timestamp};

/// Result of an accepted vote.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoteReceipt {
    pub id: ProposalId,
    pub voter: Address,
    pub support: bool,
    /// Weight actually added to the tally.
    pub weight: u128,
    pub votes_for: u128,
    pub votes_against: u128,
    /// Set when this vote decided the proposal.
    pub resolution: Option<Resolution>,
}

/// The irreversible outcome implied by the tallies, if any.
pub fn short_circuit(votes_for: u128, votes_against: u128, quorum_supply: u128) -> Option<Outcome> {
    let half = quorum_supply / 2;
    if votes_for > half {
        Some(Outcome::Passed)
    } else if votes_against > half {
        Some(Outcome::Rejected)
    } else {
        None
    }
}

/// Count `voter`'s balance on `proposal`.
///
/// `holding` and `quorum_supply` must come from one ledger view. The weight is
/// capped at the supply not yet voted, so the combined tally can never exceed
/// the quorum supply even if tokens changed hands between voters.
pub fn record_vote(
    proposal: &mut Proposal,
    voter: &Address,
    support: bool,
    holding: Holding,
    quorum_supply: u128,
    now: Timestamp,
) -> Result<VoteReceipt, GovernanceError> {
    if !proposal.is_open(now) {
        return Err(GovernanceError::ProposalNotActive(proposal.id));
    }
    if proposal.has_voted(voter) {
        return Err(GovernanceError::AlreadyVoted {
            id: proposal.id,
            voter: voter.clone(),
        });
    }
    let uncast = quorum_supply.saturating_sub(proposal.total_votes());
    let weight = holding.balance.min(uncast);
    if weight == 0 {
        return Err(GovernanceError::NoVotingPower(voter.clone()));
    }

    if support {
        proposal.votes_for = proposal
            .votes_for
            .checked_add(weight)
            .ok_or(GovernanceError::Overflow)?;
    } else {
        proposal.votes_against = proposal
            .votes_against
            .checked_add(weight)
            .ok_or(GovernanceError::Overflow)?;
    }
    proposal.voted.insert(voter.clone());

    let resolution = short_circuit(proposal.votes_for, proposal.votes_against, quorum_supply)
        .map(|outcome| proposal.resolve(outcome, now, true));

    Ok(VoteReceipt {
        id: proposal.id,
        voter: voter.clone(),
        support,
        weight,
        votes_for: proposal.votes_for,
        votes_against: proposal.votes_against,
        resolution,
    })
}
