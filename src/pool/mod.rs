//! Pool orchestration
//!
//! Fans connection establishment out across worker threads, publishes the
//! resulting units to the registry, and drives transfers and teardown.

pub mod core;
pub mod options;
pub mod results;

pub use core::SftpPool;
pub use options::{PoolOptions, dialer_from_config};
pub use results::{ConnectPoolResult, DisconnectPoolResult};
