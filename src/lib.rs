pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod middleware;
pub mod pool;
pub mod storage;
pub mod transfer;
pub mod transport;

pub use config::HarnessConfig;
pub use error::SftpPoolError;
pub use pool::{PoolOptions, SftpPool};
