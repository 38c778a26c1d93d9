//! Config v2 to v3 project upgrade.
//!
//! Moves a single-source project to the per-source layout: copies the
//! legacy bookkeeping state into the backend catalog, moves migrations and
//! seeds under a directory named after the target source, bumps the config
//! version, and re-exports metadata from the backend.
//!
//! # Modules
//!
//! - [`fs`]: Filesystem trait with `OsFs` and in-memory `MemFs`
//! - [`gate`]: decides whether an upgrade is needed and for which source
//! - [`reorganize`]: copy-then-delete move of migrations and seeds
//! - [`config`]: `config.yaml` model and the version rewrite
//! - [`resync`]: metadata export and local overwrite
//! - [`checkpoint`]: durable resume token
//! - [`layout`]: resolved project paths
//! - [`pipeline`]: the `upgrade_project` state machine
//! - [`api`], [`prompt`]: collaborator traits

pub mod api;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod fs;
pub mod gate;
pub mod layout;
pub mod pipeline;
pub mod prompt;
pub mod reorganize;
pub mod resync;

// Re-export key types for ergonomic use.
pub use api::{list_sources, ApiError, InMemoryMetadata, InconsistencyReport, MetadataApi, SourceConfig};
pub use checkpoint::{Checkpoint, CheckpointStage, CheckpointStore};
pub use config::{ConfigError, ConfigWriter, FsConfigWriter, ProjectConfig};
pub use error::{StepError, UpgradeError};
pub use fs::{Filesystem, MemFs, OsFs};
pub use gate::{check_layout_is_current, GateDecision};
pub use layout::ProjectLayout;
pub use pipeline::{UpgradeContext, UpgradeOptions, UpgradeOutcome};
pub use prompt::{NonInteractive, Prompter, ProgressReporter, TracingProgress, UpgradeStep};
pub use reorganize::ReorganizeReport;
pub use resync::{resync_metadata, MetadataFiles};
