//! On-disk node state.
//!
//! The whole state is one bincode-encoded [`StateFile`]. Saves write to a
//! sibling temporary file and rename it over the target, so a crash never
//! leaves a half-written state behind.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use estate_governance::{GovernanceSnapshot, ProposalAction};
use estate_ledger::LedgerSnapshot;
use estate_rent::RentSnapshot;
use estate_types::Address;

use crate::NodeError;

/// Format version written by this build.
pub const STATE_VERSION: u32 = 2;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateFile {
    pub version: u32,
    pub ledger: LedgerSnapshot,
    pub rent: RentSnapshot,
    pub governance: GovernanceSnapshot,
    /// Withdrawable rent credits, when the node keeps its own credit book.
    pub credits: Option<BTreeMap<Address, u128>>,
    /// Undelivered proposal actions, when the node queues them itself.
    pub outbox: Option<Vec<ProposalAction>>,
}

impl StateFile {
    pub fn new(ledger: LedgerSnapshot, rent: RentSnapshot, governance: GovernanceSnapshot) -> Self {
        Self {
            version: STATE_VERSION,
            ledger,
            rent,
            governance,
            credits: None,
            outbox: None,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, NodeError> {
        bincode::serialize(self).map_err(|e| NodeError::Persistence(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, NodeError> {
        let state: Self =
            bincode::deserialize(bytes).map_err(|e| NodeError::Persistence(e.to_string()))?;
        if state.version != STATE_VERSION {
            return Err(NodeError::Persistence(format!(
                "unsupported state version {} (expected {})",
                state.version, STATE_VERSION
            )));
        }
        Ok(state)
    }

    pub fn save(&self, path: &Path) -> Result<(), NodeError> {
        let bytes = self.encode()?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Read the state at `path`, or `None` if no state has been saved yet.
    pub fn load(path: &Path) -> Result<Option<Self>, NodeError> {
        match std::fs::read(path) {
            Ok(bytes) => Self::decode(&bytes).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
