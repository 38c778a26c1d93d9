//! Storage error types for stratum-storage.
//!
//! [`StorageError`] separates "the store cannot be reached at all"
//! (raised while preparing a store) from "a read or write against a
//! reachable store failed", and carries the state-specific conflicts the
//! transplant can hit.

use thiserror::Error;

use stratum_core::CoreError;

/// Errors produced by state store operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Preparing a store failed: table missing, endpoint unreachable.
    #[error("{store} state store unavailable: {reason}")]
    Unavailable { store: &'static str, reason: String },

    /// A get or set against a prepared store failed.
    #[error("{store} state store I/O error: {reason}")]
    Io { store: &'static str, reason: String },

    /// The catalog already holds migration records under the target name.
    #[error("catalog state already holds migrations for source '{target}'")]
    DuplicateState { target: String },

    /// The catalog latch says a previous run already copied the state.
    #[error("catalog state copy already completed; refusing to copy again")]
    StateCopyAlreadyCompleted,

    /// A stored value could not be turned into a record.
    #[error("invalid stored record: {0}")]
    InvalidRecord(#[from] CoreError),

    /// JSON serialization or deserialization of catalog state failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StorageError {
    pub(crate) fn unavailable(store: &'static str, reason: impl ToString) -> Self {
        StorageError::Unavailable {
            store,
            reason: reason.to_string(),
        }
    }

    pub(crate) fn io(store: &'static str, reason: impl ToString) -> Self {
        StorageError::Io {
            store,
            reason: reason.to_string(),
        }
    }
}
