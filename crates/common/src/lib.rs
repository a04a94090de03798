//! Ad Studio Common Utilities
//!
//! Shared infrastructure for all Ad Studio crates:
//! - Error types and result aliases
//! - Timeline clock and rate control
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
