//! Upgrade error taxonomy.
//!
//! [`StepError`] says what went wrong; [`UpgradeError`] adds which pipeline
//! step it went wrong in. Every step failure aborts the pipeline, and the
//! binary maps [`StepError::exit_code`] to the process exit status.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use stratum_core::DataSource;
use stratum_storage::StorageError;

use crate::api::ApiError;
use crate::config::ConfigError;
use crate::prompt::UpgradeStep;

/// What went wrong inside a single upgrade step.
#[derive(Debug, Error)]
pub enum StepError {
    /// The project or backend is not in a state the upgrade can start from.
    #[error("{0}")]
    Precondition(String),

    /// Several sources could own the migrations and nobody picked one.
    #[error("cannot determine which database the current migrations belong to, connected databases: {}", join_sources(.sources))]
    AmbiguousTarget { sources: Vec<DataSource> },

    /// The backend reports no connected data sources.
    #[error("found 0 connected databases on the server")]
    NoSourcesFound,

    /// A state store could not be prepared.
    #[error("state store unavailable: {0}")]
    StoreUnavailable(#[source] StorageError),

    /// A state store read or write failed.
    #[error("state store query failed: {0}")]
    StoreIo(#[source] StorageError),

    /// The catalog already holds state under the target name.
    #[error("catalog already holds migration state for database '{target}'")]
    DuplicateStateConflict { target: String },

    /// A migrations or seeds root could not be listed.
    #[error("cannot list {}: {source}", path.display())]
    DirectoryScan {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Copying an entry into the target subtree failed or did not verify.
    #[error("copying {} to {}: {source}", from.display(), to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Deleting an original after every copy succeeded failed.
    #[error("removing {}: {source}", path.display())]
    Cleanup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The bumped config version could not be written.
    #[error("writing config file: {0}")]
    ConfigPersist(#[source] ConfigError),

    /// Re-exporting metadata from the server failed.
    #[error("exporting metadata from server: {0}")]
    Resync(String),

    /// The resume token is unreadable or belongs to another target.
    #[error("upgrade checkpoint: {0}")]
    Checkpoint(String),

    /// The interactive prompt failed.
    #[error("prompt failed: {0}")]
    Prompt(#[source] io::Error),

    /// The backend API failed before any state was changed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl StepError {
    /// Process exit code for this failure. Zero is never returned.
    pub fn exit_code(&self) -> i32 {
        match self {
            StepError::Precondition(_) | StepError::NoSourcesFound => 2,
            StepError::AmbiguousTarget { .. } | StepError::Prompt(_) => 3,
            StepError::StoreUnavailable(_) | StepError::StoreIo(_) => 4,
            StepError::DuplicateStateConflict { .. } => 5,
            StepError::DirectoryScan { .. } | StepError::Copy { .. } | StepError::Cleanup { .. } => 6,
            StepError::ConfigPersist(_) => 7,
            StepError::Resync(_) => 8,
            StepError::Checkpoint(_) => 9,
            StepError::Api(_) => 10,
        }
    }
}

impl From<StorageError> for StepError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Unavailable { .. } => StepError::StoreUnavailable(err),
            StorageError::DuplicateState { target } => StepError::DuplicateStateConflict { target },
            StorageError::StateCopyAlreadyCompleted => StepError::Precondition(
                "catalog state was already copied from the legacy tables; refusing to copy it again"
                    .to_string(),
            ),
            StorageError::Io { .. }
            | StorageError::InvalidRecord(_)
            | StorageError::Serialization(_) => StepError::StoreIo(err),
        }
    }
}

/// A [`StepError`] tagged with the step it happened in.
#[derive(Debug, Error)]
#[error("{step}: {source}")]
pub struct UpgradeError {
    pub step: UpgradeStep,
    pub source: StepError,
}

impl UpgradeError {
    pub fn new(step: UpgradeStep, source: StepError) -> Self {
        UpgradeError { step, source }
    }

    pub fn kind(&self) -> &StepError {
        &self.source
    }

    pub fn exit_code(&self) -> i32 {
        self.source.exit_code()
    }

    /// Returns a closure for `map_err` that tags errors with `step`.
    pub(crate) fn in_step<E: Into<StepError>>(step: UpgradeStep) -> impl FnOnce(E) -> UpgradeError {
        move |err| UpgradeError::new(step, err.into())
    }
}

fn join_sources(sources: &[DataSource]) -> String {
    if sources.is_empty() {
        return "none".to_string();
    }
    sources
        .iter()
        .map(DataSource::name)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_map_onto_taxonomy() {
        let unavailable = StorageError::Unavailable {
            store: "table",
            reason: "gone".into(),
        };
        assert!(matches!(StepError::from(unavailable), StepError::StoreUnavailable(_)));

        let io = StorageError::Io {
            store: "catalog",
            reason: "500".into(),
        };
        assert!(matches!(StepError::from(io), StepError::StoreIo(_)));

        let dup = StorageError::DuplicateState {
            target: "pg".into(),
        };
        assert!(matches!(
            StepError::from(dup),
            StepError::DuplicateStateConflict { ref target } if target == "pg"
        ));

        assert!(matches!(
            StepError::from(StorageError::StateCopyAlreadyCompleted),
            StepError::Precondition(_)
        ));
    }

    #[test]
    fn message_is_wrapped_with_step_name() {
        let err = UpgradeError::new(UpgradeStep::CopyState, StepError::NoSourcesFound);
        assert_eq!(
            err.to_string(),
            "copying state from legacy tables: found 0 connected databases on the server"
        );
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn ambiguous_target_lists_sources() {
        let err = StepError::AmbiguousTarget {
            sources: vec![DataSource::new("a").unwrap(), DataSource::new("b").unwrap()],
        };
        assert!(err.to_string().ends_with("a, b"));
    }
}
