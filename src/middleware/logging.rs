//! Logging middleware
//!
//! Pool events are reported to an observer rather than logged inline, so
//! harnesses can collect them without parsing log output.

use log::{error, info, warn};
use std::time::Duration;

use crate::client::VuId;
use crate::error::SessionError;
use crate::transfer::TransferReport;

/// Receives pool lifecycle events. All methods default to doing nothing.
pub trait PoolObserver: Send + Sync {
    fn on_connect(&self, _vu: VuId, _addr: &str) {}

    fn on_disconnect(&self, _vu: VuId) {}

    fn on_close_error(&self, _vu: VuId, _err: &SessionError) {}

    fn on_pool_connected(&self, _units: usize, _elapsed: Duration) {}

    fn on_pool_failed(&self, _vu: VuId, _err: &SessionError) {}

    fn on_transfer(&self, _report: &TransferReport) {}
}

/// Observer that writes every event to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl PoolObserver for LogObserver {
    fn on_connect(&self, vu: VuId, addr: &str) {
        info!("VU[{:05}] Connect {}", vu, addr);
    }

    fn on_disconnect(&self, vu: VuId) {
        info!("VU[{:05}] Disconnect", vu);
    }

    fn on_close_error(&self, vu: VuId, err: &SessionError) {
        warn!("VU[{:05}] Disconnect error: {}", vu, err);
    }

    fn on_pool_connected(&self, units: usize, elapsed: Duration) {
        info!("Connected {} units in {:?}", units, elapsed);
    }

    fn on_pool_failed(&self, vu: VuId, err: &SessionError) {
        error!("VU[{:05}] failed to connect, abandoning pool: {}", vu, err);
    }

    fn on_transfer(&self, report: &TransferReport) {
        info!(
            "VU[{:05}] {} {:?} <-> {:?} ({} bytes in {:?})",
            report.vu,
            report.direction,
            report.local_path,
            report.remote_path,
            report.bytes,
            report.elapsed
        );
    }
}

/// Initialise `env_logger` from `RUST_LOG`, defaulting to `info`.
pub fn setup_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}
