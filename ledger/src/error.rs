use estate_types::{Address, AssetId};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("unknown asset {0}")]
    UnknownAsset(AssetId),

    #[error("asset {0} is already registered")]
    AssetExists(AssetId),

    #[error("mint exceeds supply cap of {asset}: cap {cap}, requested supply {requested}")]
    ExceedsCap {
        asset: AssetId,
        cap: u128,
        requested: u128,
    },

    #[error("insufficient balance for {holder}: need {needed}, have {available}")]
    InsufficientBalance {
        holder: Address,
        needed: u128,
        available: u128,
    },

    #[error("amount must be non-zero")]
    ZeroAmount,

    #[error("arithmetic overflow in ledger")]
    Overflow,

    #[error("balance observer rejected change: {0}")]
    Observer(#[from] ObserverError),

    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

/// Failure reported by a [`crate::BalanceObserver`]. The ledger aborts the
/// balance change when an observer fails.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct ObserverError(pub String);
