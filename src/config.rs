//! Configuration management for the RAX SFTP pool harness
//!
//! Settings come from an optional `rax-sftp-pool.toml` with environment
//! overrides (`RAX_SFTP__SECTION__KEY`). Every value except the target host,
//! user, key path and file name has a default.

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::transfer::DEFAULT_BUFFER_SIZE;

const CONFIG_PATHS: [&str; 2] = ["config/rax-sftp-pool", "rax-sftp-pool"];
const ENV_PREFIX: &str = "RAX_SFTP";

/// Complete harness configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HarnessConfig {
    pub target: TargetConfig,

    #[serde(default)]
    pub scenario: ScenarioConfig,

    #[serde(default)]
    pub security: SecurityConfig,

    #[serde(default)]
    pub transfer: TransferConfig,
}

/// The SFTP server every unit dials
#[derive(Debug, Deserialize, Clone)]
pub struct TargetConfig {
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    pub user: String,

    /// Private key, resolved against the safe root when relative
    pub key_path: PathBuf,

    /// Ignored for unencrypted keys
    #[serde(default)]
    pub passphrase: String,
}

/// What each unit does once the pool is up
#[derive(Debug, Deserialize, Clone)]
pub struct ScenarioConfig {
    #[serde(default = "default_vus")]
    pub vus: usize,

    #[serde(default)]
    pub local_dir: PathBuf,

    #[serde(default)]
    pub file_name: String,

    #[serde(default)]
    pub remote_dir: String,

    /// When set, every unit downloads the file back here after uploading it
    #[serde(default)]
    pub download_dir: Option<PathBuf>,

    /// Run against the in-memory transport instead of a real server
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SecurityConfig {
    /// Directory all local I/O is confined to (cwd when unset)
    #[serde(default)]
    pub safe_root: Option<PathBuf>,

    #[serde(default = "default_true")]
    pub enforce_safe_root: bool,

    /// `~/.ssh/known_hosts` when unset
    #[serde(default)]
    pub known_hosts_path: Option<PathBuf>,

    #[serde(default)]
    pub accept_any_host_key: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TransferConfig {
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// 0 disables the dial timeout
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_port() -> u16 {
    22
}

fn default_vus() -> usize {
    1
}

fn default_true() -> bool {
    true
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

fn default_connect_timeout_secs() -> u64 {
    30
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            vus: default_vus(),
            local_dir: PathBuf::new(),
            file_name: String::new(),
            remote_dir: String::new(),
            download_dir: None,
            dry_run: false,
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            safe_root: None,
            enforce_safe_root: true,
            known_hosts_path: None,
            accept_any_host_key: false,
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl HarnessConfig {
    /// Load configuration from the first config file found, with environment
    /// overrides. A missing file is fine as long as the environment supplies
    /// the required values.
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        for path in CONFIG_PATHS {
            builder = builder.add_source(File::with_name(path).required(false));
        }
        let settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: HarnessConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text, without environment overrides.
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        let config: HarnessConfig = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target.host.trim().is_empty() {
            return Err(ConfigError::Message("target.host cannot be empty".into()));
        }

        if self.target.port == 0 {
            return Err(ConfigError::Message("target.port cannot be 0".into()));
        }

        if self.target.user.trim().is_empty() {
            return Err(ConfigError::Message("target.user cannot be empty".into()));
        }

        if self.target.key_path.as_os_str().is_empty() {
            return Err(ConfigError::Message(
                "target.key_path cannot be empty".into(),
            ));
        }

        if self.scenario.file_name.trim().is_empty() {
            return Err(ConfigError::Message(
                "scenario.file_name cannot be empty".into(),
            ));
        }

        if self.transfer.buffer_size == 0 {
            return Err(ConfigError::Message(
                "transfer.buffer_size must be greater than 0".into(),
            ));
        }

        Ok(())
    }
}

impl TransferConfig {
    /// Dial timeout, or `None` when disabled
    pub fn connect_timeout(&self) -> Option<Duration> {
        match self.connect_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [target]
        host = "sftp.internal"
        user = "loadtest"
        key_path = "keys/id_ed25519"

        [scenario]
        file_name = "payload.bin"
    "#;

    #[test]
    fn test_defaults_fill_optional_sections() {
        let config = HarnessConfig::from_toml_str(MINIMAL).unwrap();

        assert_eq!(config.target.port, 22);
        assert_eq!(config.target.passphrase, "");
        assert_eq!(config.scenario.vus, 1);
        assert!(!config.scenario.dry_run);
        assert!(config.scenario.download_dir.is_none());
        assert!(config.security.enforce_safe_root);
        assert!(!config.security.accept_any_host_key);
        assert_eq!(config.transfer.buffer_size, DEFAULT_BUFFER_SIZE);
        assert_eq!(
            config.transfer.connect_timeout(),
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn test_full_config() {
        let config = HarnessConfig::from_toml_str(
            r#"
            [target]
            host = "10.0.0.5"
            port = 2222
            user = "bench"
            key_path = "/keys/id_rsa"
            passphrase = "hunter2"

            [scenario]
            vus = 50
            local_dir = "data"
            file_name = "blob.bin"
            remote_dir = "upload"
            download_dir = "back"
            dry_run = true

            [security]
            safe_root = "/srv/bench"
            enforce_safe_root = false
            known_hosts_path = "/srv/bench/known_hosts"

            [transfer]
            buffer_size = 4096
            connect_timeout_secs = 0
            "#,
        )
        .unwrap();

        assert_eq!(config.target.port, 2222);
        assert_eq!(config.scenario.vus, 50);
        assert_eq!(config.scenario.download_dir, Some(PathBuf::from("back")));
        assert!(config.scenario.dry_run);
        assert_eq!(config.security.safe_root, Some(PathBuf::from("/srv/bench")));
        assert!(!config.security.enforce_safe_root);
        assert_eq!(config.transfer.buffer_size, 4096);
        assert_eq!(config.transfer.connect_timeout(), None);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let zero_port = MINIMAL.replace("user =", "port = 0\nuser =");
        assert!(HarnessConfig::from_toml_str(&zero_port).is_err());

        let no_file = MINIMAL.replace("payload.bin", " ");
        assert!(HarnessConfig::from_toml_str(&no_file).is_err());

        let zero_buffer = format!("{}\n[transfer]\nbuffer_size = 0\n", MINIMAL);
        assert!(HarnessConfig::from_toml_str(&zero_buffer).is_err());

        let missing_target = "[scenario]\nfile_name = \"x\"\n";
        assert!(HarnessConfig::from_toml_str(missing_target).is_err());
    }
}
