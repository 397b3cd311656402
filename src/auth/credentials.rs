//! Credential types
//!
//! The transport configuration shared read-only by every session of a pool:
//! the SSH user, the decrypted private key and the host-key policy.

use log::warn;
use ssh_key::known_hosts::KnownHosts;
use ssh_key::{HashAlg, LineEnding, PrivateKey};
use std::fmt;
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

use crate::error::AuthError;

/// Where host keys are trusted from.
#[derive(Debug, Clone, Default)]
pub struct TrustSettings {
    /// Known-hosts file; `~/.ssh/known_hosts` when unset.
    pub known_hosts_path: Option<PathBuf>,
    /// Skip host-key verification entirely. Off unless explicitly set.
    pub accept_any_host_key: bool,
}

impl TrustSettings {
    pub fn known_hosts(path: impl Into<PathBuf>) -> Self {
        Self {
            known_hosts_path: Some(path.into()),
            accept_any_host_key: false,
        }
    }

    pub fn insecure_accept_any() -> Self {
        Self {
            known_hosts_path: None,
            accept_any_host_key: true,
        }
    }

    /// Resolve the known-hosts file for the invoking user.
    pub fn resolve_known_hosts_path(&self) -> Result<PathBuf, AuthError> {
        if let Some(path) = &self.known_hosts_path {
            return Ok(path.clone());
        }
        dirs::home_dir()
            .map(|home| home.join(".ssh").join("known_hosts"))
            .ok_or_else(|| AuthError::TrustStore {
                path: PathBuf::from("~/.ssh/known_hosts"),
                reason: "could not get user home directory".into(),
            })
    }
}

/// Host keys read from an OpenSSH known-hosts file.
#[derive(Debug, Clone)]
pub struct KnownHostsStore {
    path: PathBuf,
    lines: Vec<String>,
}

impl KnownHostsStore {
    /// Read and parse a known-hosts file. Every non-comment line must parse.
    pub fn load(path: &Path) -> Result<Self, AuthError> {
        let contents = std::fs::read_to_string(path).map_err(|e| AuthError::TrustStore {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::parse(path, &contents)
    }

    pub fn parse(path: &Path, contents: &str) -> Result<Self, AuthError> {
        for entry in KnownHosts::new(contents) {
            entry.map_err(|e| AuthError::TrustStore {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        }

        let lines = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_owned)
            .collect();

        Ok(Self {
            path: path.to_path_buf(),
            lines,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Known-hosts entries, one per line, comments removed.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// How a dialer decides whether to trust the server's host key.
#[derive(Debug, Clone)]
pub enum HostKeyPolicy {
    KnownHosts(KnownHostsStore),
    AcceptAny,
}

impl HostKeyPolicy {
    pub fn from_settings(trust: &TrustSettings) -> Result<Self, AuthError> {
        if trust.accept_any_host_key {
            warn!("Host-key verification is disabled; any server key will be accepted");
            return Ok(HostKeyPolicy::AcceptAny);
        }
        let path = trust.resolve_known_hosts_path()?;
        Ok(HostKeyPolicy::KnownHosts(KnownHostsStore::load(&path)?))
    }
}

/// A decrypted private key ready for public-key authentication.
pub struct KeyIdentity {
    openssh: Zeroizing<String>,
    algorithm: String,
    fingerprint: String,
}

impl KeyIdentity {
    /// Parse OpenSSH private key material, decrypting it with `passphrase`
    /// when it is encrypted.
    pub fn parse(pem: &[u8], passphrase: &str) -> Result<Self, AuthError> {
        let key =
            PrivateKey::from_openssh(pem).map_err(|e| AuthError::KeyParse(e.to_string()))?;

        let key = if key.is_encrypted() {
            key.decrypt(passphrase)
                .map_err(|e| AuthError::KeyParse(format!("decryption failed: {}", e)))?
        } else {
            key
        };

        let openssh = key
            .to_openssh(LineEnding::LF)
            .map_err(|e| AuthError::KeyParse(e.to_string()))?;

        Ok(Self {
            openssh,
            algorithm: key.algorithm().to_string(),
            fingerprint: key.public_key().fingerprint(HashAlg::Sha256).to_string(),
        })
    }

    /// Unencrypted OpenSSH encoding of the key.
    pub fn openssh(&self) -> &str {
        self.openssh.as_str()
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

impl fmt::Debug for KeyIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyIdentity")
            .field("algorithm", &self.algorithm)
            .field("fingerprint", &self.fingerprint)
            .finish_non_exhaustive()
    }
}

/// Authenticated transport configuration, built once per pool call.
#[derive(Debug)]
pub struct TransportConfig {
    user: String,
    identity: KeyIdentity,
    host_keys: HostKeyPolicy,
}

impl TransportConfig {
    pub fn new(user: impl Into<String>, identity: KeyIdentity, host_keys: HostKeyPolicy) -> Self {
        Self {
            user: user.into(),
            identity,
            host_keys,
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn identity(&self) -> &KeyIdentity {
        &self.identity
    }

    pub fn host_keys(&self) -> &HostKeyPolicy {
        &self.host_keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;
    use ssh_key::Algorithm;

    fn encrypted_key(passphrase: &str) -> String {
        let key = PrivateKey::random(&mut OsRng, Algorithm::Ed25519).unwrap();
        let key = key.encrypt(&mut OsRng, passphrase).unwrap();
        key.to_openssh(LineEnding::LF).unwrap().to_string()
    }

    #[test]
    fn test_identity_decrypts_with_passphrase() {
        let pem = encrypted_key("pw");
        let identity = KeyIdentity::parse(pem.as_bytes(), "pw").unwrap();
        assert_eq!(identity.algorithm(), "ssh-ed25519");
        assert!(identity.fingerprint().starts_with("SHA256:"));
        assert!(identity.openssh().contains("BEGIN OPENSSH PRIVATE KEY"));
        assert!(!format!("{identity:?}").contains("PRIVATE KEY"));
    }

    #[test]
    fn test_identity_rejects_wrong_passphrase() {
        let pem = encrypted_key("pw");
        let err = KeyIdentity::parse(pem.as_bytes(), "nope").unwrap_err();
        assert!(matches!(err, AuthError::KeyParse(_)));
    }

    #[test]
    fn test_identity_rejects_garbage() {
        let err = KeyIdentity::parse(b"not a key", "pw").unwrap_err();
        assert!(matches!(err, AuthError::KeyParse(_)));
    }

    #[test]
    fn test_known_hosts_skips_comments_and_blank_lines() {
        let store = KnownHostsStore::parse(Path::new("known_hosts"), "# comment\n\n").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_known_hosts_rejects_malformed_line() {
        let err = KnownHostsStore::parse(Path::new("known_hosts"), "example.com not-a-key\n")
            .unwrap_err();
        assert!(matches!(err, AuthError::TrustStore { .. }));
    }

    #[test]
    fn test_policy_accept_any_skips_known_hosts() {
        let policy = HostKeyPolicy::from_settings(&TrustSettings::insecure_accept_any()).unwrap();
        assert!(matches!(policy, HostKeyPolicy::AcceptAny));
    }

    #[test]
    fn test_policy_missing_known_hosts_is_trust_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let trust = TrustSettings::known_hosts(dir.path().join("missing"));
        let err = HostKeyPolicy::from_settings(&trust).unwrap_err();
        assert!(matches!(err, AuthError::TrustStore { .. }));
    }
}
