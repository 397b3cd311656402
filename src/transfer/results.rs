//! Transfer result types
//!
//! Defines result structures returned by transfer operations.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::client::VuId;

/// Which way the bytes went
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Upload,
    Download,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Upload => write!(f, "Upload"),
            Direction::Download => write!(f, "Download"),
        }
    }
}

/// Result of one completed upload or download
#[derive(Debug, Clone)]
pub struct TransferReport {
    pub vu: VuId,
    pub direction: Direction,
    pub local_path: PathBuf,
    pub remote_path: String,
    pub bytes: u64,
    pub elapsed: Duration,
}
