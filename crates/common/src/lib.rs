//! Clipburn Common Utilities
//!
//! Shared infrastructure for all Clipburn crates:
//! - Error types and result aliases
//! - Timestamp codec for clock-style time values
//! - Tracing/logging initialization
//! - Configuration loading

pub mod config;
pub mod error;
pub mod logging;
pub mod timecode;

pub use config::*;
pub use error::*;
pub use timecode::*;
