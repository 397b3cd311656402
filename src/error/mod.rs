//! Error handling
//!
//! Defines error types and handling for the pool.

pub mod handlers;
pub mod types;

pub use types::*;
