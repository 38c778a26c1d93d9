//! Durable resume token for an interrupted upgrade.
//!
//! The token records the chosen target and the last step that completed.
//! It lives inside the project, so it travels with the tree it describes,
//! and is removed once the config version has been committed.

use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use stratum_core::DataSource;

use crate::error::StepError;
use crate::fs::Filesystem;

/// Last completed step of an interrupted upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointStage {
    StateCopied,
    DirectoriesReorganized,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub target: DataSource,
    pub stage: CheckpointStage,
}

impl Checkpoint {
    pub fn reached(&self, stage: CheckpointStage) -> bool {
        self.stage >= stage
    }
}

/// Reads and writes the checkpoint file through a [`Filesystem`].
pub struct CheckpointStore<'a, F: ?Sized> {
    fs: &'a F,
    path: PathBuf,
}

impl<'a, F: Filesystem + ?Sized> CheckpointStore<'a, F> {
    pub fn new(fs: &'a F, path: impl Into<PathBuf>) -> Self {
        CheckpointStore {
            fs,
            path: path.into(),
        }
    }

    /// Returns the stored checkpoint, or `None` when there is none.
    pub fn load(&self) -> Result<Option<Checkpoint>, StepError> {
        let bytes = match self.fs.read_file(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.error(e)),
        };
        let checkpoint = serde_json::from_slice(&bytes).map_err(|e| self.error(e))?;
        Ok(Some(checkpoint))
    }

    pub fn save(&self, checkpoint: &Checkpoint) -> Result<(), StepError> {
        if let Some(dir) = self.path.parent() {
            self.fs.create_dir_all(dir).map_err(|e| self.error(e))?;
        }
        let json = serde_json::to_vec_pretty(checkpoint).map_err(|e| self.error(e))?;
        self.fs.write_file(&self.path, &json).map_err(|e| self.error(e))?;
        debug!(target = %checkpoint.target, stage = ?checkpoint.stage, "saved checkpoint");
        Ok(())
    }

    /// Removes the checkpoint. Succeeds if there is none.
    pub fn clear(&self) -> Result<(), StepError> {
        self.fs.remove_all(&self.path).map_err(|e| self.error(e))
    }

    fn error(&self, err: impl std::fmt::Display) -> StepError {
        StepError::Checkpoint(format!("{}: {err}", self.path.display()))
    }
}
