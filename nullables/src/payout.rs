//! Nullable payout: record rent payments without moving value.

use estate_rent::{PayoutError, RentPayout};
use estate_types::{Address, AssetId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedPayout {
    pub asset: AssetId,
    pub holder: Address,
    pub amount: u128,
}

/// Records payouts; rejects them all while failing.
#[derive(Default)]
pub struct NullPayout {
    paid: Mutex<Vec<RecordedPayout>>,
    failing: AtomicBool,
}

impl NullPayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn payouts(&self) -> Vec<RecordedPayout> {
        self.paid.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Sum paid to `holder` across all assets.
    pub fn total_paid_to(&self, holder: &Address) -> u128 {
        self.paid
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|p| &p.holder == holder)
            .map(|p| p.amount)
            .sum()
    }
}

impl RentPayout for NullPayout {
    fn pay(&self, asset: &AssetId, holder: &Address, amount: u128) -> Result<(), PayoutError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PayoutError::Unavailable("payment rail offline".into()));
        }
        self.paid
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedPayout {
                asset: asset.clone(),
                holder: holder.clone(),
                amount,
            });
        Ok(())
    }
}
