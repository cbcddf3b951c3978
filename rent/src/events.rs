//! Observability records emitted by the distributor.

use estate_types::{Address, AssetId, Timestamp};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RentEvent {
    /// Rent was deposited into an asset's pool.
    Deposited {
        asset: AssetId,
        amount: u128,
        timestamp: Timestamp,
    },
    /// A holder claimed and was paid their entitlement.
    Claimed {
        asset: AssetId,
        holder: Address,
        amount: u128,
        timestamp: Timestamp,
    },
    /// Entitlement was settled ahead of a balance change.
    Settled {
        asset: AssetId,
        holder: Address,
        amount: u128,
    },
}
