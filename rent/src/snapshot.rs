//! Serializable image of every rent pool.

use crate::pool::RentPool;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentSnapshot {
    /// Pools sorted by asset id.
    pub pools: Vec<RentPool>,
}

impl RentSnapshot {
    pub fn total_deposited(&self) -> u128 {
        self.pools
            .iter()
            .fold(0u128, |acc, p| acc.saturating_add(p.total_deposited))
    }
}
