//! Estate node: hosts fractional ownership of physical assets.
//!
//! The node is the coordinator that:
//! - Keeps the per-asset share ledger
//! - Distributes deposited rent in proportion to holdings
//! - Runs token-weighted governance over each asset
//! - Persists all of it between runs

pub mod config;
pub mod error;
pub mod logging;
pub mod node;
pub mod outbox;
pub mod persist;

pub use config::NodeConfig;
pub use error::NodeError;
pub use logging::{init_logging, LogFormat};
pub use node::EstateNode;
pub use outbox::ActionOutbox;
pub use persist::{StateFile, STATE_VERSION};
