//! The main Estate node struct: wires the ledger, rent and governance together.

use std::sync::Arc;

use estate_governance::{ActionDispatcher, GovernanceEngine};
use estate_ledger::InMemoryLedger;
use estate_rent::{CreditPayout, RentDistributor, RentPayout};
use estate_types::{Clock, SystemClock};
use tracing::info;

use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::outbox::ActionOutbox;
use crate::persist::StateFile;

/// A single process hosting the share ledger, the rent distributor and the
/// governance engine.
///
/// The distributor is subscribed to the ledger on construction, so every
/// balance movement settles rent at the old balance before it is applied.
///
/// A node built by [`EstateNode::with_defaults`] owns its credit book and
/// action outbox, and persists both alongside the rest of its state.
pub struct EstateNode {
    config: NodeConfig,
    ledger: Arc<InMemoryLedger>,
    rent: Arc<RentDistributor>,
    governance: GovernanceEngine,
    credits: Option<Arc<CreditPayout>>,
    outbox: Option<Arc<ActionOutbox>>,
}

impl EstateNode {
    /// Build a node from explicit collaborators, restoring saved state when
    /// `config.state_path` points at an existing state file.
    pub fn new(
        config: NodeConfig,
        payout: Arc<dyn RentPayout>,
        dispatcher: Arc<dyn ActionDispatcher>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, NodeError> {
        Self::build(config, payout, dispatcher, clock, None, None)
    }

    /// A node paying rent into withdrawable credits and queueing executed
    /// actions in an outbox, on the system clock.
    pub fn with_defaults(config: NodeConfig) -> Result<Self, NodeError> {
        let credits = Arc::new(CreditPayout::new());
        let outbox = Arc::new(ActionOutbox::new());
        Self::build(
            config,
            credits.clone(),
            outbox.clone(),
            Arc::new(SystemClock),
            Some(credits),
            Some(outbox),
        )
    }

    fn build(
        config: NodeConfig,
        payout: Arc<dyn RentPayout>,
        dispatcher: Arc<dyn ActionDispatcher>,
        clock: Arc<dyn Clock>,
        credits: Option<Arc<CreditPayout>>,
        outbox: Option<Arc<ActionOutbox>>,
    ) -> Result<Self, NodeError> {
        let ledger = Arc::new(InMemoryLedger::new());
        let rent = Arc::new(RentDistributor::new(ledger.clone(), payout, clock.clone()));
        ledger.subscribe(rent.clone());
        let governance =
            GovernanceEngine::new(config.governance.clone(), ledger.clone(), dispatcher, clock)?;

        let node = Self {
            config,
            ledger,
            rent,
            governance,
            credits,
            outbox,
        };
        node.load()?;
        Ok(node)
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<InMemoryLedger> {
        &self.ledger
    }

    pub fn rent(&self) -> &Arc<RentDistributor> {
        &self.rent
    }

    pub fn governance(&self) -> &GovernanceEngine {
        &self.governance
    }

    /// The node's own credit book, if it pays rent into one.
    pub fn credits(&self) -> Option<&Arc<CreditPayout>> {
        self.credits.as_ref()
    }

    /// The node's own action outbox, if it queues executed actions.
    pub fn outbox(&self) -> Option<&Arc<ActionOutbox>> {
        self.outbox.as_ref()
    }

    pub fn state(&self) -> StateFile {
        let mut state = StateFile::new(
            self.ledger.snapshot(),
            self.rent.snapshot(),
            self.governance.snapshot(),
        );
        state.credits = self.credits.as_ref().map(|c| c.snapshot());
        state.outbox = self.outbox.as_ref().map(|o| o.snapshot());
        state
    }

    /// Write the current state to `state_path`. Returns `false` when no path
    /// is configured.
    pub fn save(&self) -> Result<bool, NodeError> {
        let Some(path) = &self.config.state_path else {
            return Ok(false);
        };
        let state = self.state();
        state.save(path)?;
        info!(
            path = %path.display(),
            assets = state.ledger.assets.len(),
            proposals = state.governance.proposals.len(),
            "node state saved"
        );
        Ok(true)
    }

    fn load(&self) -> Result<(), NodeError> {
        let Some(path) = &self.config.state_path else {
            return Ok(());
        };
        let Some(state) = StateFile::load(path)? else {
            info!(path = %path.display(), "no saved state, starting empty");
            return Ok(());
        };
        self.ledger.restore(state.ledger)?;
        self.rent.restore(state.rent);
        self.governance.restore(state.governance);
        if let (Some(book), Some(credits)) = (&self.credits, state.credits) {
            book.restore(credits);
        }
        if let (Some(outbox), Some(actions)) = (&self.outbox, state.outbox) {
            outbox.restore(actions);
        }
        info!(path = %path.display(), "node state restored");
        Ok(())
    }
}
