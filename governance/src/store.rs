//! Proposal storage with per-proposal locking.

use crate::error::GovernanceError;
use crate::params::{GovernanceParams, QuorumSupply, BPS_DENOMINATOR};
use crate::proposal::{Proposal, ProposalId, ProposalState};
use crate::snapshot::GovernanceSnapshot;
use estate_ledger::Holding;
use estate_types::{Address, AssetId, Timestamp};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

/// Fields of a new proposal supplied by the proposer.
#[derive(Clone, Debug)]
pub struct NewProposal {
    pub governance_asset: AssetId,
    pub proposer: Address,
    pub description: String,
    pub target: Address,
    pub payload: Vec<u8>,
}

pub(crate) fn lock(entry: &Mutex<Proposal>) -> MutexGuard<'_, Proposal> {
    entry.lock().unwrap_or_else(|e| e.into_inner())
}

/// Proposer's share of supply in basis points, rounded down.
///
/// An empty supply gives no power at all.
pub fn proposal_power_bps(holding: Holding) -> Result<u128, GovernanceError> {
    if holding.total_supply == 0 {
        return Ok(0);
    }
    let scaled = holding
        .balance
        .checked_mul(BPS_DENOMINATOR)
        .ok_or(GovernanceError::Overflow)?;
    Ok(scaled / holding.total_supply)
}

/// All proposals, keyed by id. Ids are never reused.
pub struct ProposalStore {
    proposals: RwLock<BTreeMap<ProposalId, Arc<Mutex<Proposal>>>>,
    next_id: AtomicU64,
}

impl ProposalStore {
    pub fn new() -> Self {
        Self {
            proposals: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Validate and store a new Active proposal.
    ///
    /// `holding` is the proposer's view of the governance asset at `now`.
    pub fn create(
        &self,
        params: &GovernanceParams,
        new: NewProposal,
        holding: Holding,
        now: Timestamp,
    ) -> Result<Proposal, GovernanceError> {
        if new.description.trim().is_empty() {
            return Err(GovernanceError::EmptyDescription);
        }
        let have_bps = proposal_power_bps(holding)?;
        let need_bps = params.proposal_threshold_bps;
        if holding.total_supply == 0 || have_bps < u128::from(need_bps) {
            return Err(GovernanceError::InsufficientProposalPower { have_bps, need_bps });
        }

        let id = ProposalId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        let supply_snapshot = match params.quorum_supply {
            QuorumSupply::Live => None,
            QuorumSupply::Snapshot => Some(holding.total_supply),
        };
        let proposal = Proposal {
            id,
            proposer: new.proposer,
            description: new.description,
            target: new.target,
            payload: new.payload,
            governance_asset: new.governance_asset,
            created_at: now,
            voting_deadline: now.plus_secs(params.voting_period_secs),
            execution_delay_secs: params.execution_delay_secs,
            votes_for: 0,
            votes_against: 0,
            voted: BTreeSet::new(),
            state: ProposalState::Active,
            resolved_at: None,
            executable_at: None,
            supply_snapshot,
            executed_at: None,
            executed_by: None,
            executing: false,
        };
        self.proposals
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, Arc::new(Mutex::new(proposal.clone())));
        Ok(proposal)
    }

    pub fn entry(&self, id: ProposalId) -> Result<Arc<Mutex<Proposal>>, GovernanceError> {
        self.proposals
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned()
            .ok_or(GovernanceError::ProposalNotFound(id))
    }

    /// Every proposal entry in id order.
    pub fn entries(&self) -> Vec<Arc<Mutex<Proposal>>> {
        self.proposals
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.proposals.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Id the next proposal will receive.
    pub fn next_id(&self) -> ProposalId {
        ProposalId::new(self.next_id.load(Ordering::SeqCst))
    }

    pub fn snapshot(&self) -> GovernanceSnapshot {
        let next_id = self.next_id();
        let proposals = self.entries().iter().map(|e| lock(e).clone()).collect();
        GovernanceSnapshot { next_id, proposals }
    }

    /// Replace all proposals. The id counter never moves backwards past a
    /// restored proposal.
    pub fn restore(&self, snapshot: GovernanceSnapshot) {
        let highest = snapshot
            .proposals
            .iter()
            .map(|p| p.id.as_u64().saturating_add(1))
            .max()
            .unwrap_or(0);
        let next = snapshot.next_id.as_u64().max(highest);
        let restored: BTreeMap<_, _> = snapshot
            .proposals
            .into_iter()
            .map(|mut p| {
                p.executing = false;
                (p.id, Arc::new(Mutex::new(p)))
            })
            .collect();
        *self.proposals.write().unwrap_or_else(|e| e.into_inner()) = restored;
        self.next_id.store(next, Ordering::SeqCst);
    }
}

impl Default for ProposalStore {
    fn default() -> Self {
        Self::new()
    }
}
