//! Virtual unit management
//!
//! Tracks which unit identity owns which live transport session.

pub mod registry;

pub use registry::{SharedSession, VuId, VuRegistry};
