//! The value-transfer seam used when a claim succeeds.

use crate::error::PayoutError;
use estate_types::{Address, AssetId};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

/// Moves claimed rent to the holder.
///
/// Called after the pool has already recorded the claim and with no pool lock
/// held, so an implementation may call back into the distributor.
pub trait RentPayout: Send + Sync {
    fn pay(&self, asset: &AssetId, holder: &Address, amount: u128) -> Result<(), PayoutError>;
}

/// Pull-payment credit book: claimed rent accumulates as a withdrawable
/// credit per holder.
#[derive(Default)]
pub struct CreditPayout {
    credits: Mutex<HashMap<Address, u128>>,
}

impl CreditPayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn credit_of(&self, holder: &Address) -> u128 {
        self.credits
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(holder)
            .copied()
            .unwrap_or(0)
    }

    /// Remove and return the holder's whole credit.
    pub fn withdraw(&self, holder: &Address) -> u128 {
        self.credits
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(holder)
            .unwrap_or(0)
    }

    /// Outstanding credits, sorted by holder.
    pub fn snapshot(&self) -> BTreeMap<Address, u128> {
        self.credits
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|(_, c)| **c > 0)
            .map(|(h, &c)| (h.clone(), c))
            .collect()
    }

    /// Replace the whole credit book.
    pub fn restore(&self, credits: BTreeMap<Address, u128>) {
        *self.credits.lock().unwrap_or_else(|e| e.into_inner()) = credits.into_iter().collect();
    }
}

impl RentPayout for CreditPayout {
    fn pay(&self, _asset: &AssetId, holder: &Address, amount: u128) -> Result<(), PayoutError> {
        let mut credits = self.credits.lock().unwrap_or_else(|e| e.into_inner());
        let credit = credits.entry(holder.clone()).or_insert(0);
        *credit = credit
            .checked_add(amount)
            .ok_or_else(|| PayoutError::Rejected(format!("credit overflow for {holder}")))?;
        Ok(())
    }
}
