//! Pool result types
//!
//! Defines result structures returned by pool-wide operations.

use std::time::Duration;

use crate::client::VuId;

/// Result of a successful `connect_pool`
#[derive(Debug, Clone)]
pub struct ConnectPoolResult {
    /// Identities of the new units, ascending
    pub ids: Vec<VuId>,
    /// Wall-clock time from start of fan-out to the last unit connecting
    pub elapsed: Duration,
}

/// Result of a successful `disconnect_pool`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisconnectPoolResult {
    pub closed: usize,
}
