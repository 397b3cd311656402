//! Shared fixtures for unit tests.

use rand::rngs::OsRng;
use ssh_key::{Algorithm, LineEnding, PrivateKey};

use crate::auth::{HostKeyPolicy, KeyIdentity, TransportConfig};

/// A transport config with a fresh unencrypted key and no host-key checks.
pub(crate) fn test_config() -> TransportConfig {
    let key = PrivateKey::random(&mut OsRng, Algorithm::Ed25519).unwrap();
    let pem = key.to_openssh(LineEnding::LF).unwrap();
    let identity = KeyIdentity::parse(pem.as_bytes(), "").unwrap();
    TransportConfig::new("tester", identity, HostKeyPolicy::AcceptAny)
}
