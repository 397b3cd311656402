//! Local storage access
//!
//! Handles the safe root, path validation and guarded file operations.

pub mod filesystem;
pub mod validation;

// Re-export commonly used validation types
pub use validation::{PathGuard, SafePath, SafeRoot, clean_path};
