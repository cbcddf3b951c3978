//! Read interface and change notifications of the balance ledger.

use crate::error::{LedgerError, ObserverError};
use estate_types::{Address, AssetId};
use serde::{Deserialize, Serialize};

/// A holder's balance together with the asset's total supply, read in one
/// consistent view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holding {
    pub balance: u128,
    pub total_supply: u128,
}

/// Source of truth for balances and supply. The core never mutates it.
pub trait BalanceLedger: Send + Sync {
    fn balance_of(&self, asset: &AssetId, holder: &Address) -> Result<u128, LedgerError>;

    fn total_supply(&self, asset: &AssetId) -> Result<u128, LedgerError>;

    /// Balance and supply read atomically.
    ///
    /// The default implementation issues two reads and is only consistent for
    /// ledgers that cannot change between them; implementations backed by
    /// shared state should override it.
    fn holding(&self, asset: &AssetId, holder: &Address) -> Result<Holding, LedgerError> {
        let total_supply = self.total_supply(asset)?;
        let balance = self.balance_of(asset, holder)?;
        Ok(Holding {
            balance,
            total_supply,
        })
    }

    /// Run `f` with the asset's total supply while no balance change can
    /// begin, so whatever `f` records against that supply is ordered with
    /// respect to every settlement the ledger issues.
    ///
    /// The default implementation reads the supply and calls `f` directly.
    fn with_stable_supply(
        &self,
        asset: &AssetId,
        f: &mut dyn FnMut(u128),
    ) -> Result<(), LedgerError> {
        f(self.total_supply(asset)?);
        Ok(())
    }
}

/// A single holder's balance movement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BalanceChange {
    pub asset: AssetId,
    pub holder: Address,
    pub old_balance: u128,
    pub new_balance: u128,
}

/// Notified synchronously before every balance movement.
pub trait BalanceObserver: Send + Sync {
    fn on_balance_change(&self, change: &BalanceChange) -> Result<(), ObserverError>;
}
