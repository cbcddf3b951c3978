//! Governance facade: proposals, votes and execution against one ledger.
//!
//! Every call first applies any deadline resolution that is due, so callers
//! never observe an Active proposal whose voting period is over. Events are
//! emitted after the proposal's lock is released.

use crate::error::GovernanceError;
use crate::events::GovernanceEvent;
use crate::params::GovernanceParams;
use crate::proposal::{Outcome, Proposal, ProposalAction, ProposalId, ProposalState, Resolution};
use crate::scheduler::{ActionDispatcher, ExecutionClaim, ExecutionScheduler};
use crate::snapshot::GovernanceSnapshot;
use crate::store::{lock, NewProposal, ProposalStore};
use crate::tally::{self, VoteReceipt};
use estate_ledger::BalanceLedger;
use estate_types::{Address, AssetId, Clock};
use estate_utils::{format_duration, EventBus};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

pub struct GovernanceEngine {
    params: GovernanceParams,
    ledger: Arc<dyn BalanceLedger>,
    clock: Arc<dyn Clock>,
    store: ProposalStore,
    scheduler: ExecutionScheduler,
    events: EventBus<GovernanceEvent>,
}

fn resolved_event(resolution: &Resolution) -> GovernanceEvent {
    GovernanceEvent::ProposalResolved {
        id: resolution.id,
        state: resolution.outcome.into(),
        votes_for: resolution.votes_for,
        votes_against: resolution.votes_against,
        short_circuit: resolution.short_circuit,
        executable_at: resolution.executable_at,
    }
}

impl GovernanceEngine {
    pub fn new(
        params: GovernanceParams,
        ledger: Arc<dyn BalanceLedger>,
        dispatcher: Arc<dyn ActionDispatcher>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, GovernanceError> {
        params.validate()?;
        Ok(Self {
            params,
            ledger,
            clock,
            store: ProposalStore::new(),
            scheduler: ExecutionScheduler::new(dispatcher),
            events: EventBus::new(),
        })
    }

    pub fn params(&self) -> &GovernanceParams {
        &self.params
    }

    pub fn events(&self) -> &EventBus<GovernanceEvent> {
        &self.events
    }

    /// Lock a proposal with any due deadline resolution applied.
    fn observe<'a>(
        &self,
        entry: &'a Mutex<Proposal>,
    ) -> (MutexGuard<'a, Proposal>, Option<Resolution>) {
        let mut proposal = lock(entry);
        let resolution = proposal.refresh(self.clock.now());
        (proposal, resolution)
    }

    fn announce_resolution(&self, resolution: Option<Resolution>) {
        let Some(resolution) = resolution else {
            return;
        };
        let outcome = match resolution.outcome {
            Outcome::Passed => "passed",
            Outcome::Rejected => "rejected",
        };
        info!(
            id = %resolution.id,
            outcome,
            votes_for = resolution.votes_for,
            votes_against = resolution.votes_against,
            short_circuit = resolution.short_circuit,
            "proposal resolved"
        );
        self.events.emit(&resolved_event(&resolution));
    }

    /// Open a proposal to send `payload` to `target`, voted on by holders of
    /// `asset`.
    pub fn create_proposal(
        &self,
        asset: &AssetId,
        proposer: &Address,
        description: impl Into<String>,
        target: &Address,
        payload: Vec<u8>,
    ) -> Result<ProposalId, GovernanceError> {
        let holding = self.ledger.holding(asset, proposer)?;
        let now = self.clock.now();
        let proposal = self.store.create(
            &self.params,
            NewProposal {
                governance_asset: asset.clone(),
                proposer: proposer.clone(),
                description: description.into(),
                target: target.clone(),
                payload,
            },
            holding,
            now,
        )?;

        info!(
            id = %proposal.id,
            %asset,
            %proposer,
            voting_period = %format_duration(self.params.voting_period_secs),
            "proposal created"
        );
        self.events.emit(&GovernanceEvent::ProposalCreated {
            id: proposal.id,
            proposer: proposal.proposer,
            description: proposal.description,
        });
        Ok(proposal.id)
    }

    /// Vote on an Active proposal with `voter`'s whole balance.
    pub fn cast_vote(
        &self,
        id: ProposalId,
        voter: &Address,
        support: bool,
    ) -> Result<VoteReceipt, GovernanceError> {
        let entry = self.store.entry(id)?;
        let (result, expired) = {
            let (mut proposal, expired) = self.observe(&entry);
            let result = self.vote_locked(&mut proposal, voter, support);
            (result, expired)
        };
        self.announce_resolution(expired);
        let receipt = result?;

        debug!(
            %id,
            %voter,
            support,
            weight = receipt.weight,
            votes_for = receipt.votes_for,
            votes_against = receipt.votes_against,
            "vote cast"
        );
        self.events.emit(&GovernanceEvent::VoteCast {
            id,
            voter: voter.clone(),
            support,
            weight: receipt.weight,
        });
        self.announce_resolution(receipt.resolution.clone());
        Ok(receipt)
    }

    fn vote_locked(
        &self,
        proposal: &mut Proposal,
        voter: &Address,
        support: bool,
    ) -> Result<VoteReceipt, GovernanceError> {
        let now = self.clock.now();
        if !proposal.is_open(now) {
            return Err(GovernanceError::ProposalNotActive(proposal.id));
        }
        let holding = self.ledger.holding(&proposal.governance_asset, voter)?;
        let quorum_supply = proposal.supply_snapshot.unwrap_or(holding.total_supply);
        tally::record_vote(proposal, voter, support, holding, quorum_supply, now)
    }

    pub fn get_proposal(&self, id: ProposalId) -> Result<Proposal, GovernanceError> {
        let entry = self.store.entry(id)?;
        let (proposal, expired) = {
            let (proposal, expired) = self.observe(&entry);
            (proposal.clone(), expired)
        };
        self.announce_resolution(expired);
        Ok(proposal)
    }

    /// All proposals in creation order.
    pub fn list_proposals(&self) -> Vec<Proposal> {
        self.store
            .entries()
            .iter()
            .map(|entry| {
                let (proposal, expired) = {
                    let (proposal, expired) = self.observe(entry);
                    (proposal.clone(), expired)
                };
                self.announce_resolution(expired);
                proposal
            })
            .collect()
    }

    pub fn list_by_state(&self, state: ProposalState) -> Vec<Proposal> {
        self.list_proposals()
            .into_iter()
            .filter(|p| p.state == state)
            .collect()
    }

    /// Open the execution window of a Passed proposal whose delay is over.
    pub fn try_transition_to_executable(&self, id: ProposalId) -> Result<(), GovernanceError> {
        let entry = self.store.entry(id)?;
        let (result, expired) = {
            let (mut proposal, expired) = self.observe(&entry);
            let result = ExecutionScheduler::make_executable(&mut proposal, self.clock.now());
            (result, expired)
        };
        self.announce_resolution(expired);
        if let Err(GovernanceError::DelayNotElapsed { remaining_secs, .. }) = &result {
            debug!(%id, remaining = %format_duration(*remaining_secs), "execution delay pending");
        }
        result?;

        info!(%id, "proposal executable");
        self.events.emit(&GovernanceEvent::ProposalExecutable { id });
        Ok(())
    }

    /// Dispatch an Executable proposal's action. Succeeds at most once.
    ///
    /// The proposal is not locked while the dispatcher runs; a concurrent or
    /// re-entrant attempt meanwhile fails with `NotExecutable`. A failed or
    /// panicking dispatch leaves the proposal Executable so it can be retried.
    pub fn execute_proposal(
        &self,
        id: ProposalId,
        executor: &Address,
    ) -> Result<ProposalAction, GovernanceError> {
        let entry = self.store.entry(id)?;
        let (begun, expired) = {
            let (mut proposal, expired) = self.observe(&entry);
            (ExecutionScheduler::begin(&mut proposal), expired)
        };
        self.announce_resolution(expired);
        let action = begun?;

        let claim = ExecutionClaim::new(&entry);
        let outcome = self.scheduler.dispatch(&action);
        let finished =
            ExecutionScheduler::finish(&mut lock(&entry), outcome, executor, self.clock.now());
        claim.settled();
        if let Err(e) = finished {
            warn!(%id, %executor, error = %e, "proposal execution failed");
            self.events.emit(&GovernanceEvent::ExecutionFailed {
                id,
                reason: e.to_string(),
            });
            return Err(e);
        }

        info!(%id, %executor, action = %action, "proposal executed");
        self.events.emit(&GovernanceEvent::ProposalExecuted {
            id,
            executor: executor.clone(),
        });
        Ok(action)
    }

    pub fn snapshot(&self) -> GovernanceSnapshot {
        self.store.snapshot()
    }

    pub fn restore(&self, snapshot: GovernanceSnapshot) {
        info!(proposals = snapshot.proposals.len(), "governance state restored");
        self.store.restore(snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DispatchError;
    use crate::params::QuorumSupply;
    use estate_ledger::InMemoryLedger;
    use estate_nullables::NullClock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const HOUR: u64 = 3_600;

    fn asset() -> AssetId {
        AssetId::new("villa")
    }

    fn addr(name: &str) -> Address {
        Address::new(name)
    }

    /// Counts dispatches; panics while `panics` is non-zero, then fails while
    /// `failures` is non-zero.
    #[derive(Default)]
    struct CountingDispatcher {
        calls: AtomicUsize,
        failures: AtomicUsize,
        panics: AtomicUsize,
    }

    fn take_one(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    impl ActionDispatcher for CountingDispatcher {
        fn dispatch(&self, _: &ProposalAction) -> Result<(), DispatchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if take_one(&self.panics) {
                panic!("dispatcher crashed");
            }
            if take_one(&self.failures) {
                Err(DispatchError::Unavailable("target paused".into()))
            } else {
                Ok(())
            }
        }
    }

    struct Fixture {
        ledger: Arc<InMemoryLedger>,
        clock: Arc<NullClock>,
        dispatcher: Arc<CountingDispatcher>,
        engine: GovernanceEngine,
    }

    fn fixture(params: GovernanceParams, holdings: &[(&str, u128)]) -> Fixture {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.register_asset(asset(), 10_000).unwrap();
        for (name, amount) in holdings {
            ledger.mint(&asset(), &addr(name), *amount).unwrap();
        }
        let clock = Arc::new(NullClock::new(1_000));
        let dispatcher = Arc::new(CountingDispatcher::default());
        let engine =
            GovernanceEngine::new(params, ledger.clone(), dispatcher.clone(), clock.clone())
                .unwrap();
        Fixture {
            ledger,
            clock,
            dispatcher,
            engine,
        }
    }

    fn params(period: u64, delay: u64) -> GovernanceParams {
        GovernanceParams {
            voting_period_secs: period,
            execution_delay_secs: delay,
            ..GovernanceParams::default()
        }
    }

    fn propose(f: &Fixture, proposer: &str) -> ProposalId {
        f.engine
            .create_proposal(&asset(), &addr(proposer), "fix the roof", &addr("roofer"), vec![7])
            .unwrap()
    }

    #[test]
    fn invalid_params_are_rejected() {
        let ledger = Arc::new(InMemoryLedger::new());
        let result = GovernanceEngine::new(
            params(0, 0),
            ledger,
            Arc::new(CountingDispatcher::default()),
            Arc::new(NullClock::new(0)),
        );
        assert!(matches!(result, Err(GovernanceError::InvalidParams(_))));
    }

    #[test]
    fn unknown_asset_error_is_propagated() {
        let f = fixture(params(HOUR, 0), &[("alice", 1_000)]);
        let err = f
            .engine
            .create_proposal(&AssetId::new("ghost"), &addr("alice"), "x", &addr("t"), vec![])
            .unwrap_err();
        assert!(matches!(err, GovernanceError::Ledger(_)));
    }

    #[test]
    fn deadline_resolution_is_lazy_and_announced_once() {
        let f = fixture(params(HOUR, 0), &[("alice", 3_000), ("bob", 2_000), ("carol", 5_000)]);
        let resolved = Arc::new(AtomicUsize::new(0));
        let r = resolved.clone();
        f.engine.events().subscribe(move |e| {
            if matches!(e, GovernanceEvent::ProposalResolved { .. }) {
                r.fetch_add(1, Ordering::SeqCst);
            }
        });

        let id = propose(&f, "alice");
        f.engine.cast_vote(id, &addr("alice"), true).unwrap();
        f.engine.cast_vote(id, &addr("bob"), false).unwrap();
        f.clock.advance(HOUR + 1);

        assert_eq!(f.engine.list_by_state(ProposalState::Passed).len(), 1);
        let p = f.engine.get_proposal(id).unwrap();
        assert_eq!(p.resolved_at, Some(p.voting_deadline));
        assert_eq!(resolved.load(Ordering::SeqCst), 1);

        let late = f.engine.cast_vote(id, &addr("carol"), false);
        assert_eq!(late.unwrap_err(), GovernanceError::ProposalNotActive(id));
    }

    #[test]
    fn tokens_moved_between_voters_are_not_counted_twice() {
        let f = fixture(params(HOUR, 0), &[("alice", 5_000), ("bob", 5_000)]);
        let id = propose(&f, "alice");
        f.engine.cast_vote(id, &addr("alice"), false).unwrap();
        f.ledger
            .transfer(&asset(), &addr("alice"), &addr("dave"), 5_000)
            .unwrap();
        f.engine.cast_vote(id, &addr("bob"), true).unwrap();
        let receipt = f.engine.cast_vote(id, &addr("dave"), true);
        assert_eq!(receipt.unwrap_err(), GovernanceError::NoVotingPower(addr("dave")));
        let p = f.engine.get_proposal(id).unwrap();
        assert_eq!(p.total_votes(), 10_000);
        assert_eq!(p.state, ProposalState::Active);
    }

    #[test]
    fn snapshot_quorum_ignores_later_mints() {
        let params = GovernanceParams {
            quorum_supply: QuorumSupply::Snapshot,
            ..params(HOUR, 0)
        };
        let f = fixture(params, &[("alice", 1_000), ("bob", 800)]);
        let id = propose(&f, "alice");
        f.ledger.mint(&asset(), &addr("carol"), 8_000).unwrap();
        // 1000 of a 1800 snapshot is a majority even though live supply is 9800.
        let receipt = f.engine.cast_vote(id, &addr("alice"), true).unwrap();
        assert!(receipt.resolution.is_some());
        assert_eq!(f.engine.get_proposal(id).unwrap().state, ProposalState::Passed);
    }

    #[test]
    fn failed_dispatch_can_be_retried() {
        let f = fixture(params(HOUR, 0), &[("alice", 6_000), ("bob", 4_000)]);
        f.dispatcher.failures.store(1, Ordering::SeqCst);
        let id = propose(&f, "alice");
        f.engine.cast_vote(id, &addr("alice"), true).unwrap();
        f.engine.try_transition_to_executable(id).unwrap();

        let err = f.engine.execute_proposal(id, &addr("bob")).unwrap_err();
        assert!(matches!(err, GovernanceError::Dispatch(DispatchError::Unavailable(_))));
        assert_eq!(f.engine.get_proposal(id).unwrap().state, ProposalState::Executable);

        let action = f.engine.execute_proposal(id, &addr("bob")).unwrap();
        assert_eq!(action.target, addr("roofer"));
        assert_eq!(f.dispatcher.calls.load(Ordering::SeqCst), 2);
        let p = f.engine.get_proposal(id).unwrap();
        assert_eq!(p.state, ProposalState::Executed);
        assert_eq!(p.executed_by, Some(addr("bob")));
        assert_eq!(p.executed_at, Some(f.clock.now()));
    }

    #[test]
    fn panicking_dispatch_releases_the_execution_claim() {
        let f = fixture(params(HOUR, 0), &[("alice", 6_000), ("bob", 4_000)]);
        f.dispatcher.panics.store(1, Ordering::SeqCst);
        let id = propose(&f, "alice");
        f.engine.cast_vote(id, &addr("alice"), true).unwrap();
        f.engine.try_transition_to_executable(id).unwrap();

        let crashed = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            f.engine.execute_proposal(id, &addr("bob"))
        }));
        assert!(crashed.is_err());
        assert_eq!(f.engine.get_proposal(id).unwrap().state, ProposalState::Executable);

        f.engine.execute_proposal(id, &addr("bob")).unwrap();
        assert_eq!(f.dispatcher.calls.load(Ordering::SeqCst), 2);
        assert_eq!(f.engine.get_proposal(id).unwrap().state, ProposalState::Executed);
    }

    #[test]
    fn blank_description_is_rejected() {
        let f = fixture(params(HOUR, 0), &[("alice", 1_000)]);
        let err = f
            .engine
            .create_proposal(&asset(), &addr("alice"), "  ", &addr("t"), vec![])
            .unwrap_err();
        assert_eq!(err, GovernanceError::EmptyDescription);
        assert!(f.engine.list_proposals().is_empty());
    }

    #[test]
    fn concurrent_votes_count_each_holder_once() {
        let voters: Vec<(String, u128)> = (0..20).map(|i| (format!("holder{i}"), 400)).collect();
        let holdings: Vec<(&str, u128)> = voters.iter().map(|(n, b)| (n.as_str(), *b)).collect();
        let f = fixture(params(HOUR, 0), &holdings);
        let id = propose(&f, "holder0");

        // Every holder votes from three threads at once. Even holders support,
        // so neither side reaches a strict majority.
        let accepted: usize = std::thread::scope(|s| {
            let handles: Vec<_> = (0..60)
                .map(|i| {
                    let (name, _) = &voters[i % voters.len()];
                    let engine = &f.engine;
                    s.spawn(move || engine.cast_vote(id, &addr(name), i % 2 == 0).is_ok())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap() as usize).sum()
        });

        let p = f.engine.get_proposal(id).unwrap();
        assert_eq!(accepted, 20);
        assert_eq!(p.voted.len(), 20);
        assert_eq!((p.votes_for, p.votes_against), (4_000, 4_000));
        assert_eq!(p.state, ProposalState::Active);
        assert!(p.total_votes() <= f.ledger.total_supply(&asset()).unwrap());
    }

    #[test]
    fn concurrent_execution_dispatches_once() {
        let f = fixture(params(HOUR, 0), &[("alice", 6_000), ("bob", 4_000)]);
        let id = propose(&f, "alice");
        f.engine.cast_vote(id, &addr("alice"), true).unwrap();
        f.engine.try_transition_to_executable(id).unwrap();

        let executed: usize = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| f.engine.execute_proposal(id, &addr("bob")).is_ok()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap() as usize).sum()
        });
        assert_eq!(executed, 1);
        assert_eq!(f.dispatcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(f.engine.get_proposal(id).unwrap().state, ProposalState::Executed);
    }

    #[test]
    fn rejected_proposal_never_becomes_executable() {
        let f = fixture(params(HOUR, 0), &[("alice", 4_000), ("bob", 6_000)]);
        let id = propose(&f, "alice");
        f.engine.cast_vote(id, &addr("bob"), false).unwrap();
        assert_eq!(
            f.engine.try_transition_to_executable(id),
            Err(GovernanceError::NotPassed(id))
        );
        assert_eq!(
            f.engine.execute_proposal(id, &addr("alice")).unwrap_err(),
            GovernanceError::NotExecutable(id)
        );
        assert_eq!(f.dispatcher.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn snapshot_restores_into_fresh_engine() {
        let f = fixture(params(HOUR, 0), &[("alice", 6_000), ("bob", 4_000)]);
        let first = propose(&f, "alice");
        f.engine.cast_vote(first, &addr("bob"), true).unwrap();
        let snapshot = f.engine.snapshot();

        let restored = GovernanceEngine::new(
            params(HOUR, 0),
            f.ledger.clone(),
            Arc::new(CountingDispatcher::default()),
            f.clock.clone(),
        )
        .unwrap();
        restored.restore(snapshot);
        assert_eq!(
            restored.cast_vote(first, &addr("bob"), true).unwrap_err(),
            GovernanceError::AlreadyVoted {
                id: first,
                voter: addr("bob")
            }
        );
        let second = restored
            .create_proposal(&asset(), &addr("bob"), "second", &addr("t"), vec![])
            .unwrap();
        assert_eq!(second, ProposalId::new(1));
    }
}
