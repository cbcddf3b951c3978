use crate::proposal::{Proposal, ProposalId};
use serde::{Deserialize, Serialize};

/// Persistable image of the governance engine.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceSnapshot {
    pub next_id: ProposalId,
    /// In id order.
    pub proposals: Vec<Proposal>,
}
