//! Pool middleware
//!
//! Provides the observer used for logging pool events.

pub mod logging;

pub use logging::{LogObserver, PoolObserver, setup_logging};
