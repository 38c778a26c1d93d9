//! Resolved paths of a project tree.

use std::path::{Path, PathBuf};

use crate::config::{ProjectConfig, CONFIG_FILE_NAME};

/// Directory holding stratum's own bookkeeping inside a project.
pub const STATE_DIR_NAME: &str = ".stratum";

/// Absolute paths the upgrade touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    pub root: PathBuf,
    pub config_file: PathBuf,
    pub migrations_dir: PathBuf,
    pub seeds_dir: PathBuf,
    pub metadata_dir: PathBuf,
}

impl ProjectLayout {
    /// Resolves the directories named in `config` against `root`.
    pub fn from_config(root: &Path, config: &ProjectConfig) -> Self {
        ProjectLayout {
            root: root.to_path_buf(),
            config_file: root.join(CONFIG_FILE_NAME),
            migrations_dir: root.join(&config.migrations_directory),
            seeds_dir: root.join(&config.seeds_directory),
            metadata_dir: root.join(&config.metadata_directory),
        }
    }

    /// Location of the upgrade resume token.
    pub fn checkpoint_file(&self) -> PathBuf {
        self.root.join(STATE_DIR_NAME).join("upgrade-v3.json")
    }
}
