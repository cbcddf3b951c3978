//! Per-asset rent pool: accumulator, holder debts and settlement math.

use crate::error::RentError;
use crate::math::mul_div;
use estate_types::{Address, AssetId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fixed-point scale of `cumulative_rent_per_share` (10^18).
pub const SCALE: u128 = 1_000_000_000_000_000_000;

/// Claim accounting for one holder of one asset.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolderAccount {
    /// Accumulator value at the holder's last claim or balance change.
    pub debt: u128,
    /// Entitlement settled at a previous balance but not yet paid out.
    pub unpaid: u128,
    /// Lifetime amount paid to this holder.
    pub claimed: u128,
}

/// The rent ledger of one asset. Never deleted once created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentPool {
    pub asset: AssetId,
    /// Lifetime rent per unit of supply, scaled by [`SCALE`].
    pub cumulative_rent_per_share: u128,
    pub total_deposited: u128,
    pub total_claimed: u128,
    pub holders: BTreeMap<Address, HolderAccount>,
    pub created_at: Timestamp,
    pub last_deposit_at: Option<Timestamp>,
}

/// Read-only view of a pool's totals.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentPoolSummary {
    pub asset: AssetId,
    pub cumulative_rent_per_share: u128,
    pub total_deposited: u128,
    pub total_claimed: u128,
    pub holder_count: usize,
    pub last_deposit_at: Option<Timestamp>,
}

impl RentPool {
    pub fn new(asset: AssetId, now: Timestamp) -> Self {
        Self {
            asset,
            cumulative_rent_per_share: 0,
            total_deposited: 0,
            total_claimed: 0,
            holders: BTreeMap::new(),
            created_at: now,
            last_deposit_at: None,
        }
    }

    /// Spread `amount` over `total_supply` units.
    ///
    /// Returns the new accumulator value. Rounding dust stays in the pool and
    /// is never distributed.
    pub fn accrue(
        &mut self,
        amount: u128,
        total_supply: u128,
        now: Timestamp,
    ) -> Result<u128, RentError> {
        if amount == 0 {
            return Err(RentError::ZeroAmount);
        }
        if total_supply == 0 {
            return Err(RentError::EmptyPool(self.asset.clone()));
        }
        let delta = mul_div(amount, SCALE, total_supply).ok_or(RentError::Overflow)?;
        let cumulative = self
            .cumulative_rent_per_share
            .checked_add(delta)
            .ok_or(RentError::Overflow)?;
        let deposited = self
            .total_deposited
            .checked_add(amount)
            .ok_or(RentError::Overflow)?;

        self.cumulative_rent_per_share = cumulative;
        self.total_deposited = deposited;
        self.last_deposit_at = Some(now);
        Ok(cumulative)
    }

    /// Rent earned at `balance` since the account's debt snapshot.
    fn pending(&self, account: &HolderAccount, balance: u128) -> Result<u128, RentError> {
        let growth = self.cumulative_rent_per_share.saturating_sub(account.debt);
        mul_div(balance, growth, SCALE).ok_or(RentError::Overflow)
    }

    /// Current entitlement of `holder` at `balance`. Pure read.
    pub fn entitlement(&self, holder: &Address, balance: u128) -> Result<u128, RentError> {
        match self.holders.get(holder) {
            Some(account) => account
                .unpaid
                .checked_add(self.pending(account, balance)?)
                .ok_or(RentError::Overflow),
            None => self.pending(&HolderAccount::default(), balance),
        }
    }

    /// Bank what `holder` earned at `old_balance` and reset its debt.
    ///
    /// Called before the holder's balance moves. Returns the settled amount.
    pub fn settle(&mut self, holder: &Address, old_balance: u128) -> Result<u128, RentError> {
        let cumulative = self.cumulative_rent_per_share;
        let current = self.holders.get(holder).cloned().unwrap_or_default();
        let earned = self.pending(&current, old_balance)?;
        let unpaid = current
            .unpaid
            .checked_add(earned)
            .ok_or(RentError::Overflow)?;

        let account = self.holders.entry(holder.clone()).or_default();
        account.unpaid = unpaid;
        account.debt = cumulative;
        Ok(earned)
    }

    /// Remove the holder's whole entitlement from the pool for payment.
    ///
    /// Fails with [`RentError::NothingToClaim`] when nothing is owed, leaving
    /// the pool untouched.
    pub fn take_entitlement(&mut self, holder: &Address, balance: u128) -> Result<u128, RentError> {
        let owed = self.entitlement(holder, balance)?;
        if owed == 0 {
            return Err(RentError::NothingToClaim {
                asset: self.asset.clone(),
                holder: holder.clone(),
            });
        }
        let total_claimed = self
            .total_claimed
            .checked_add(owed)
            .ok_or(RentError::Overflow)?;
        let cumulative = self.cumulative_rent_per_share;

        let account = self.holders.entry(holder.clone()).or_default();
        account.claimed = account.claimed.checked_add(owed).ok_or(RentError::Overflow)?;
        account.debt = cumulative;
        account.unpaid = 0;
        self.total_claimed = total_claimed;
        Ok(owed)
    }

    /// Undo a [`RentPool::take_entitlement`] whose payout failed. The amount
    /// becomes unpaid entitlement again.
    pub fn restore_entitlement(&mut self, holder: &Address, amount: u128) {
        let account = self.holders.entry(holder.clone()).or_default();
        account.unpaid = account.unpaid.saturating_add(amount);
        account.claimed = account.claimed.saturating_sub(amount);
        self.total_claimed = self.total_claimed.saturating_sub(amount);
    }

    pub fn summary(&self) -> RentPoolSummary {
        RentPoolSummary {
            asset: self.asset.clone(),
            cumulative_rent_per_share: self.cumulative_rent_per_share,
            total_deposited: self.total_deposited,
            total_claimed: self.total_claimed,
            holder_count: self.holders.len(),
            last_deposit_at: self.last_deposit_at,
        }
    }
}
