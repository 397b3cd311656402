//! Transfer module
//!
//! Whole-file uploads and downloads over a unit's SFTP sub-session.

pub mod file_ops;
pub mod results;

// Re-export key types and functions
pub use file_ops::{DEFAULT_BUFFER_SIZE, download_file, remote_join, upload_file};
pub use results::{Direction, TransferReport};
