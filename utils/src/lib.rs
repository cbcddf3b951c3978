//! Shared utilities for the Estate workspace.

pub mod events;
pub mod logging;
pub mod time;

pub use events::EventBus;
pub use logging::init_tracing;
pub use time::format_duration;
