//! Transport capabilities
//!
//! The pool never speaks SSH or SFTP itself. It drives these three seams:
//! a dialer producing authenticated connections, a connection that can host
//! one file-transfer sub-session, and the sub-session's file primitives.

use std::io::{self, Read, Write};

use crate::auth::TransportConfig;

/// Opens authenticated secure-channel connections.
pub trait Dialer: Send + Sync + 'static {
    /// Dial `host:port`, verify the host and authenticate with `config`.
    fn dial(&self, config: &TransportConfig, host: &str, port: u16)
    -> io::Result<Box<dyn Connection>>;
}

/// One authenticated connection.
pub trait Connection: Send {
    /// Layer a file-transfer sub-session on this connection.
    fn open_sftp(&mut self) -> io::Result<Box<dyn RemoteFs>>;

    fn close(&mut self) -> io::Result<()>;
}

/// A file-transfer sub-session.
pub trait RemoteFs: Send {
    /// Create or truncate a remote file for writing.
    fn create(&self, path: &str) -> io::Result<Box<dyn Write + Send>>;

    /// Open a remote file for reading.
    fn open(&self, path: &str) -> io::Result<Box<dyn Read + Send>>;

    fn close(&mut self) -> io::Result<()>;
}
