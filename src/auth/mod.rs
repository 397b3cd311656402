//! Authentication system
//!
//! Loads private keys, validates credentials and builds the host-key policy.

pub mod credentials;
pub mod loader;
pub mod validator;

pub use credentials::{HostKeyPolicy, KeyIdentity, KnownHostsStore, TransportConfig, TrustSettings};
pub use loader::load_transport_config;
pub use validator::validate_user;
