//! Error types
//!
//! Defines domain-specific error types for each module of the pool.

use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::client::VuId;

/// Path guard errors
#[derive(Debug)]
pub enum GuardError {
    PathViolation { path: PathBuf, root: PathBuf },
    EmptyFileName,
}

impl fmt::Display for GuardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardError::PathViolation { path, root } => write!(
                f,
                "Path violation: {} is outside safe root {}",
                path.display(),
                root.display()
            ),
            GuardError::EmptyFileName => write!(f, "Empty file name"),
        }
    }
}

impl std::error::Error for GuardError {}

/// Credential loading errors. Any of these aborts pool setup before dialing.
#[derive(Debug)]
pub enum AuthError {
    InvalidUser(String),
    Credential(GuardError),
    KeyRead { path: PathBuf, source: io::Error },
    KeyParse(String),
    TrustStore { path: PathBuf, reason: String },
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::InvalidUser(u) => write!(f, "Invalid username: {:?}", u),
            AuthError::Credential(e) => write!(f, "Invalid key path: {}", e),
            AuthError::KeyRead { path, source } => {
                write!(f, "Failed to read key file {}: {}", path.display(), source)
            }
            AuthError::KeyParse(reason) => write!(f, "Failed to parse private key: {}", reason),
            AuthError::TrustStore { path, reason } => write!(
                f,
                "Could not load known hosts from {}: {}",
                path.display(),
                reason
            ),
        }
    }
}

impl std::error::Error for AuthError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AuthError::Credential(e) => Some(e),
            AuthError::KeyRead { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<GuardError> for AuthError {
    fn from(error: GuardError) -> Self {
        AuthError::Credential(error)
    }
}

/// Transport session errors
#[derive(Debug)]
pub enum SessionError {
    Dial { addr: String, source: io::Error },
    SessionStart { addr: String, source: io::Error },
    CloseSftp { addr: String, source: io::Error },
    CloseConnection { addr: String, source: io::Error },
    Cancelled,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Dial { addr, source } => {
                write!(f, "Failed to dial SFTP host {}: {}", addr, source)
            }
            SessionError::SessionStart { addr, source } => {
                write!(f, "Failed to start SFTP session on {}: {}", addr, source)
            }
            SessionError::CloseSftp { addr, source } => {
                write!(f, "Error closing SFTP session on {}: {}", addr, source)
            }
            SessionError::CloseConnection { addr, source } => {
                write!(f, "Error disconnecting from {}: {}", addr, source)
            }
            SessionError::Cancelled => write!(f, "Connect cancelled after an earlier failure"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Dial { source, .. }
            | SessionError::SessionStart { source, .. }
            | SessionError::CloseSftp { source, .. }
            | SessionError::CloseConnection { source, .. } => Some(source),
            SessionError::Cancelled => None,
        }
    }
}

/// Registry lookup errors
#[derive(Debug)]
pub enum ClientError {
    UnknownUnit(VuId),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::UnknownUnit(vu) => write!(f, "Unknown unit: VU[{:05}]", vu),
        }
    }
}

impl std::error::Error for ClientError {}

/// Per-transfer errors
#[derive(Debug)]
pub enum TransferError {
    LocalOpen { path: PathBuf, source: io::Error },
    LocalCreate { path: PathBuf, source: io::Error },
    RemoteCreate { path: String, source: io::Error },
    RemoteOpen { path: String, source: io::Error },
    Copy { from: String, to: String, source: io::Error },
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferError::LocalOpen { path, source } => {
                write!(f, "Failed to open local file {}: {}", path.display(), source)
            }
            TransferError::LocalCreate { path, source } => {
                write!(f, "Failed to create local file {}: {}", path.display(), source)
            }
            TransferError::RemoteCreate { path, source } => {
                write!(f, "Failed to create remote file {}: {}", path, source)
            }
            TransferError::RemoteOpen { path, source } => {
                write!(f, "Failed to open remote file {}: {}", path, source)
            }
            TransferError::Copy { from, to, source } => {
                write!(f, "Failed to copy {} to {}: {}", from, to, source)
            }
        }
    }
}

impl std::error::Error for TransferError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransferError::LocalOpen { source, .. }
            | TransferError::LocalCreate { source, .. }
            | TransferError::RemoteCreate { source, .. }
            | TransferError::RemoteOpen { source, .. }
            | TransferError::Copy { source, .. } => Some(source),
        }
    }
}

/// General pool error that encompasses all error types
#[derive(Debug)]
pub enum SftpPoolError {
    Path(GuardError),
    Auth(AuthError),
    Session(SessionError),
    Client(ClientError),
    Transfer(TransferError),
    Unit {
        vu: VuId,
        source: SessionError,
    },
    Teardown {
        vu: VuId,
        source: SessionError,
        failed: usize,
        total: usize,
    },
    Worker {
        vu: Option<VuId>,
        reason: String,
    },
    InvalidPoolSize(usize),
}

impl fmt::Display for SftpPoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SftpPoolError::Path(e) => write!(f, "Path error: {}", e),
            SftpPoolError::Auth(e) => write!(f, "Failed to configure SFTP connection: {}", e),
            SftpPoolError::Session(e) => write!(f, "Session error: {}", e),
            SftpPoolError::Client(e) => write!(f, "Client error: {}", e),
            SftpPoolError::Transfer(e) => write!(f, "Transfer error: {}", e),
            SftpPoolError::Unit { vu, source } => {
                write!(f, "Failed to connect VU[{:05}]: {}", vu, source)
            }
            SftpPoolError::Teardown {
                vu,
                source,
                failed,
                total,
            } => write!(
                f,
                "Teardown failed for {}/{} units, first VU[{:05}]: {}",
                failed, total, vu, source
            ),
            SftpPoolError::Worker { vu: Some(vu), reason } => {
                write!(f, "Worker for VU[{:05}] failed: {}", vu, reason)
            }
            SftpPoolError::Worker { vu: None, reason } => write!(f, "Worker failed: {}", reason),
            SftpPoolError::InvalidPoolSize(n) => {
                write!(f, "Cannot create a pool of {} units: identity range exhausted", n)
            }
        }
    }
}

impl std::error::Error for SftpPoolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SftpPoolError::Path(e) => Some(e),
            SftpPoolError::Auth(e) => Some(e),
            SftpPoolError::Session(e) => Some(e),
            SftpPoolError::Client(e) => Some(e),
            SftpPoolError::Transfer(e) => Some(e),
            SftpPoolError::Unit { source, .. } | SftpPoolError::Teardown { source, .. } => {
                Some(source)
            }
            SftpPoolError::Worker { .. } | SftpPoolError::InvalidPoolSize(_) => None,
        }
    }
}

// Implement conversions from specific errors to SftpPoolError
impl From<GuardError> for SftpPoolError {
    fn from(error: GuardError) -> Self {
        SftpPoolError::Path(error)
    }
}

impl From<AuthError> for SftpPoolError {
    fn from(error: AuthError) -> Self {
        SftpPoolError::Auth(error)
    }
}

impl From<SessionError> for SftpPoolError {
    fn from(error: SessionError) -> Self {
        SftpPoolError::Session(error)
    }
}

impl From<ClientError> for SftpPoolError {
    fn from(error: ClientError) -> Self {
        SftpPoolError::Client(error)
    }
}

impl From<TransferError> for SftpPoolError {
    fn from(error: TransferError) -> Self {
        SftpPoolError::Transfer(error)
    }
}
