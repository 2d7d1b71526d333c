//! Foundation utilities shared by every callbrief crate.
//!
//! Holds the error taxonomy, exit codes, tracing setup, redaction of
//! secrets in error text, atomic document writes and small shared enums.

pub mod atomic_write;
pub mod error;
pub mod exit_codes;
pub mod logging;
pub mod redaction;
pub mod types;

pub use error::{CallbriefError, ConfigError, ErrorCategory, LlmError, UserFriendlyError};
pub use exit_codes::ExitCode;
