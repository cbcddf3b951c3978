//! Nullable infrastructure for deterministic testing.
//!
//! Inspired by the "A-frame architecture" pattern from RsNano.
//! Every collaborator of the core (clock, rent payout, action dispatch) is
//! abstracted behind a trait. This crate provides test-friendly
//! implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically
//! - Record what they were asked to do
//!
//! Usage: swap real implementations for nullables in tests.

pub mod clock;
pub mod dispatcher;
pub mod payout;

pub use clock::NullClock;
pub use dispatcher::NullDispatcher;
pub use payout::{NullPayout, RecordedPayout};
