//! Utilities
pub mod linalg;
pub mod save;
pub mod stats;
