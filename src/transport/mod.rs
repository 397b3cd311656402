//! Transport module
//!
//! Capability traits for the secure channel and its SFTP sub-session, the
//! session type built on them, and two dialers: libssh2 and in-memory.

pub mod memory;
pub mod session;
pub mod ssh;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

// Re-export key types
pub use memory::MemoryDialer;
pub use session::TransportSession;
pub use ssh::Ssh2Dialer;
pub use traits::{Connection, Dialer, RemoteFs};
