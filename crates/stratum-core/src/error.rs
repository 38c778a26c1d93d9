//! Core error types for stratum-core.
//!
//! Uses `thiserror` for structured, matchable variants covering invalid
//! values in the data model itself.

use thiserror::Error;

/// Errors produced while constructing core data model values.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A `config.yaml` version integer outside the known range.
    #[error("unknown project config version: {value}")]
    UnknownVersion { value: u8 },

    /// A data source name that cannot be used as a directory name.
    #[error("invalid data source name '{name}': {reason}")]
    InvalidSourceName { name: String, reason: &'static str },

    /// A migration version that is not an unsigned integer.
    #[error("invalid migration version '{value}': expected an unsigned integer")]
    InvalidMigrationVersion { value: String },
}
