//! Error handlers
//!
//! Provides error reporting helpers for the harness binary.

use crate::error::types::SftpPoolError;
use log::error;

/// Handle a pool error
pub fn handle_error(err: &SftpPoolError) {
    error!("[{}] {}", error_phase(err), err);
}

/// Name the lifecycle phase an error belongs to
pub fn error_phase(err: &SftpPoolError) -> &'static str {
    match err {
        SftpPoolError::Path(_) => "guard",
        SftpPoolError::Auth(_) | SftpPoolError::InvalidPoolSize(_) => "setup",
        SftpPoolError::Session(_) | SftpPoolError::Unit { .. } | SftpPoolError::Worker { .. } => {
            "connect"
        }
        SftpPoolError::Client(_) => "lookup",
        SftpPoolError::Transfer(_) => "transfer",
        SftpPoolError::Teardown { .. } => "teardown",
    }
}

/// Convert error to process exit code
pub fn error_to_exit_code(err: &SftpPoolError) -> i32 {
    match err {
        SftpPoolError::Auth(_) | SftpPoolError::InvalidPoolSize(_) => 2,
        SftpPoolError::Session(_) | SftpPoolError::Unit { .. } | SftpPoolError::Worker { .. } => 3,
        SftpPoolError::Path(_) => 4,
        SftpPoolError::Client(_) => 5,
        SftpPoolError::Transfer(_) => 6,
        SftpPoolError::Teardown { .. } => 7,
    }
}
