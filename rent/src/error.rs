//! Rent-specific errors.

use estate_ledger::LedgerError;
use estate_types::{Address, AssetId};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RentError {
    #[error("asset {0} has zero supply, deposit would be unrecoverable")]
    EmptyPool(AssetId),

    #[error("no new rent to claim for {holder} on {asset}")]
    NothingToClaim { asset: AssetId, holder: Address },

    #[error("amount must be non-zero")]
    ZeroAmount,

    #[error("arithmetic overflow in rent computation")]
    Overflow,

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("payout failed: {0}")]
    Payout(#[from] PayoutError),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PayoutError {
    #[error("payout rejected: {0}")]
    Rejected(String),

    #[error("payout target unavailable: {0}")]
    Unavailable(String),
}
