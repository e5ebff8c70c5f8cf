//! # qspect Utilities
//!
//! Shared utilities and logging for the qspect workspace.
//!
//! This crate provides the logging infrastructure used by the decoder core
//! and the CLI harness, built on `tracing`.

pub mod logging;

// Re-export commonly used logging functions for convenience
pub use logging::{LogFormat, LogLevel, init_logging, init_logging_to_file, init_logging_with_level};
pub use tracing::{debug, error, info, trace, warn};
