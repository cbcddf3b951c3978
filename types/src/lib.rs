//! Fundamental types for the Estate workspace.
//!
//! Holder and asset identifiers, timestamps and the clock abstraction shared
//! by the rent ledger and the governance engine.

pub mod address;
pub mod error;
pub mod time;

pub use address::{Address, AssetId};
pub use error::TypesError;
pub use time::{Clock, SystemClock, Timestamp};
