//! Pool options
//!
//! Settings shared by every unit of a pool, and the transport they dial with.

use std::sync::Arc;

use crate::auth::TrustSettings;
use crate::config::HarnessConfig;
use crate::storage::{PathGuard, SafeRoot};
use crate::transfer::DEFAULT_BUFFER_SIZE;
use crate::transport::{Dialer, MemoryDialer, Ssh2Dialer};

/// Pool-wide settings
#[derive(Debug, Clone)]
pub struct PoolOptions {
    pub guard: PathGuard,
    pub trust: TrustSettings,
    pub buffer_size: usize,
}

impl PoolOptions {
    /// Options confined to `guard`, verifying host keys against the user's
    /// known-hosts file.
    pub fn new(guard: PathGuard) -> Self {
        Self {
            guard,
            trust: TrustSettings::default(),
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }

    pub fn with_trust(mut self, trust: TrustSettings) -> Self {
        self.trust = trust;
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.max(1);
        self
    }

    pub fn from_config(config: &HarnessConfig) -> Self {
        let root = SafeRoot::resolve(config.security.safe_root.as_deref());
        let guard = PathGuard::new(root).with_enforcement(config.security.enforce_safe_root);
        let trust = TrustSettings {
            known_hosts_path: config.security.known_hosts_path.clone(),
            accept_any_host_key: config.security.accept_any_host_key,
        };

        Self::new(guard)
            .with_trust(trust)
            .with_buffer_size(config.transfer.buffer_size)
    }
}

/// Pick the transport for a configuration: in-memory for dry runs, SSH
/// otherwise.
pub fn dialer_from_config(config: &HarnessConfig) -> Arc<dyn Dialer> {
    if config.scenario.dry_run {
        Arc::new(MemoryDialer::new())
    } else {
        Arc::new(Ssh2Dialer::new(config.transfer.connect_timeout()))
    }
}
