//! Proportional rent distribution for fractionalised assets.
//!
//! Each asset owns a [`RentPool`] holding a fixed-point accumulator of rent
//! deposited per unit of supply. A holder's entitlement is
//!
//! `unpaid + balance × (cumulative_rent_per_share − debt) / SCALE`
//!
//! where `debt` is the accumulator value at the holder's last claim or
//! balance change. The [`RentDistributor`] settles entitlement at the *old*
//! balance whenever the ledger reports a balance movement, so tokens acquired
//! after a deposit never earn from it and tokens disposed of keep what they
//! already earned.

pub mod distributor;
pub mod error;
pub mod events;
pub mod math;
pub mod payout;
pub mod pool;
pub mod snapshot;

pub use distributor::{DepositReceipt, RentDistributor};
pub use error::{PayoutError, RentError};
pub use events::RentEvent;
pub use payout::{CreditPayout, RentPayout};
pub use pool::{HolderAccount, RentPool, RentPoolSummary, SCALE};
pub use snapshot::RentSnapshot;
