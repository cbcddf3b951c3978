//! Governance parameters.
//!
//! Defaults follow the production deployment: a 5% proposal threshold, a
//! three-day voting period and a one-day execution delay.

use crate::error::GovernanceError;
use serde::{Deserialize, Serialize};

pub const BPS_DENOMINATOR: u128 = 10_000;

/// Which total supply the short-circuit majority is measured against.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuorumSupply {
    /// Supply read at vote time, in the same ledger view as the voter's weight.
    #[default]
    Live,
    /// Supply captured when the proposal was created.
    Snapshot,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceParams {
    /// Minimum share of supply, in basis points, needed to open a proposal.
    #[serde(default = "default_threshold_bps")]
    pub proposal_threshold_bps: u32,

    #[serde(default = "default_voting_period_secs")]
    pub voting_period_secs: u64,

    /// Cooling-off period between resolution and executability.
    #[serde(default = "default_execution_delay_secs")]
    pub execution_delay_secs: u64,

    #[serde(default)]
    pub quorum_supply: QuorumSupply,
}

fn default_threshold_bps() -> u32 {
    500
}

fn default_voting_period_secs() -> u64 {
    3 * 24 * 60 * 60
}

fn default_execution_delay_secs() -> u64 {
    24 * 60 * 60
}

impl GovernanceParams {
    pub fn validate(&self) -> Result<(), GovernanceError> {
        if u128::from(self.proposal_threshold_bps) > BPS_DENOMINATOR {
            return Err(GovernanceError::InvalidParams(format!(
                "proposal_threshold_bps {} exceeds {}",
                self.proposal_threshold_bps, BPS_DENOMINATOR
            )));
        }
        if self.voting_period_secs == 0 {
            return Err(GovernanceError::InvalidParams(
                "voting_period_secs must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

impl Default for GovernanceParams {
    fn default() -> Self {
        Self {
            proposal_threshold_bps: default_threshold_bps(),
            voting_period_secs: default_voting_period_secs(),
            execution_delay_secs: default_execution_delay_secs(),
            quorum_supply: QuorumSupply::Live,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_deployment() {
        let p = GovernanceParams::default();
        assert_eq!(p.proposal_threshold_bps, 500);
        assert_eq!(p.voting_period_secs, 259_200);
        assert_eq!(p.execution_delay_secs, 86_400);
        assert_eq!(p.quorum_supply, QuorumSupply::Live);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn threshold_above_100_percent_is_invalid() {
        let p = GovernanceParams {
            proposal_threshold_bps: 10_001,
            ..GovernanceParams::default()
        };
        assert!(matches!(p.validate(), Err(GovernanceError::InvalidParams(_))));
    }

    #[test]
    fn zero_voting_period_is_invalid() {
        let p = GovernanceParams {
            voting_period_secs: 0,
            ..GovernanceParams::default()
        };
        assert!(p.validate().is_err());
    }
}
