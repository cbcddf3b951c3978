//! The fungible balance ledger the core consults.
//!
//! The rent ledger and the governance engine only ever *read* balances through
//! [`BalanceLedger`]. A ledger that moves balances notifies every registered
//! [`BalanceObserver`] synchronously, before the balance changes, so pending
//! rent entitlement can be settled at the old balance.
//!
//! [`InMemoryLedger`] is a capped, mintable ledger used by the node and tests.

pub mod balance;
pub mod error;
pub mod memory;

pub use balance::{BalanceChange, BalanceLedger, BalanceObserver, Holding};
pub use error::{LedgerError, ObserverError};
pub use memory::{AssetRecord, InMemoryLedger, LedgerSnapshot};
