//! Credential loader
//!
//! Turns (user, key path, passphrase) into a [`TransportConfig`]. Runs before
//! any network activity; every failure aborts the calling connect.

use log::{debug, info};
use std::path::Path;

use crate::auth::credentials::{HostKeyPolicy, KeyIdentity, TransportConfig, TrustSettings};
use crate::auth::validator::validate_user;
use crate::error::AuthError;
use crate::storage::{PathGuard, filesystem};

/// Load and decrypt the private key at `key_path` and bind it to the host-key
/// policy described by `trust`.
pub fn load_transport_config(
    guard: &PathGuard,
    trust: &TrustSettings,
    user: &str,
    key_path: impl AsRef<Path>,
    passphrase: &str,
) -> Result<TransportConfig, AuthError> {
    validate_user(user)?;

    let key_path = guard.guard(key_path)?;
    let pem = filesystem::read_all(&key_path).map_err(|source| AuthError::KeyRead {
        path: key_path.as_path().to_path_buf(),
        source,
    })?;
    debug!("Read {} bytes of key material from {}", pem.len(), key_path.as_path().display());

    let identity = KeyIdentity::parse(&pem, passphrase)?;
    let host_keys = HostKeyPolicy::from_settings(trust)?;

    match &host_keys {
        HostKeyPolicy::KnownHosts(store) => info!(
            "Loaded {} key {} for user {} ({} known hosts from {})",
            identity.algorithm(),
            identity.fingerprint(),
            user,
            store.len(),
            store.path().display()
        ),
        HostKeyPolicy::AcceptAny => info!(
            "Loaded {} key {} for user {} (host keys not verified)",
            identity.algorithm(),
            identity.fingerprint(),
            user
        ),
    }

    Ok(TransportConfig::new(user, identity, host_keys))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;
    use ssh_key::{Algorithm, LineEnding, PrivateKey};

    fn write_plain_key(dir: &Path) -> std::path::PathBuf {
        let key = PrivateKey::random(&mut OsRng, Algorithm::Ed25519).unwrap();
        let path = dir.join("id_ed25519");
        std::fs::write(&path, key.to_openssh(LineEnding::LF).unwrap().as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_with_known_hosts() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = write_plain_key(dir.path());
        let known_hosts = dir.path().join("known_hosts");
        std::fs::write(&known_hosts, "# none yet\n").unwrap();

        let guard = PathGuard::new(dir.path());
        let config = load_transport_config(
            &guard,
            &TrustSettings::known_hosts(&known_hosts),
            "alice",
            &key_path,
            "",
        )
        .unwrap();

        assert_eq!(config.user(), "alice");
        assert!(matches!(config.host_keys(), HostKeyPolicy::KnownHosts(_)));
    }

    #[test]
    fn test_key_outside_root_is_credential_error() {
        let root = tempfile::tempdir().unwrap();
        let elsewhere = tempfile::tempdir().unwrap();
        let key_path = write_plain_key(elsewhere.path());

        let guard = PathGuard::new(root.path());
        let err = load_transport_config(
            &guard,
            &TrustSettings::insecure_accept_any(),
            "alice",
            &key_path,
            "",
        )
        .unwrap_err();
        assert!(matches!(err, AuthError::Credential(_)));
    }

    #[test]
    fn test_missing_key_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let guard = PathGuard::new(dir.path());
        let err = load_transport_config(
            &guard,
            &TrustSettings::insecure_accept_any(),
            "alice",
            "no_such_key",
            "pw",
        )
        .unwrap_err();
        assert!(matches!(err, AuthError::KeyRead { .. }));
    }

    #[test]
    fn test_missing_known_hosts_fails_after_key_parse() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = write_plain_key(dir.path());
        let guard = PathGuard::new(dir.path());
        let err = load_transport_config(
            &guard,
            &TrustSettings::known_hosts(dir.path().join("absent")),
            "alice",
            &key_path,
            "",
        )
        .unwrap_err();
        assert!(matches!(err, AuthError::TrustStore { .. }));
    }
}
