//! The config v2 to v3 upgrade.
//!
//! [`UpgradeContext::upgrade_project`] runs the steps in order, each gating
//! the next:
//!
//! 1. preflight: version, server capability and consistency, target choice
//! 2. state copy from the legacy tables into the catalog
//! 3. migrations and seeds moved under the target's directory
//! 4. config version bumped to v3
//! 5. metadata re-exported from the server
//!
//! Steps 2 and 3 are recorded in a checkpoint inside the project so that a
//! run that failed later resumes without repeating them. The checkpoint is
//! removed once the config is committed; the metadata export is safe to
//! repeat on its own.

use tracing::{debug, info, warn};

use stratum_core::{DataSource, ProjectSchemaVersion};
use stratum_storage::{
    copy_state, state_already_copied, CatalogStateApi, CatalogStore, CopyReport, StateStore,
};

use crate::api::{list_sources, MetadataApi};
use crate::checkpoint::{Checkpoint, CheckpointStage, CheckpointStore};
use crate::config::{rewrite_version, ConfigWriter, ProjectConfig};
use crate::error::{StepError, UpgradeError};
use crate::fs::Filesystem;
use crate::gate::{evaluate, resolve_target, GateDecision, GateInput};
use crate::layout::ProjectLayout;
use crate::prompt::{ProgressReporter, Prompter, UpgradeStep};
use crate::reorganize::{reorganize, ReorganizeReport};
use crate::resync::resync_metadata;

const TARGET_VERSION: ProjectSchemaVersion = ProjectSchemaVersion::LATEST;

/// Options for one upgrade run.
#[derive(Debug, Clone)]
pub struct UpgradeOptions {
    pub layout: ProjectLayout,
    /// Skip the confirmation prompt.
    pub force: bool,
    /// Source that owns the current migrations, instead of asking.
    pub target_source: Option<DataSource>,
    /// Stop after copying the state; leave files and config alone.
    pub move_state_only: bool,
}

/// How an upgrade run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeOutcome {
    /// The project is now at v3.
    Upgraded {
        target: DataSource,
        /// `None` when an earlier run had already copied the state.
        state: Option<CopyReport>,
        /// `None` when the move had completed in an earlier run.
        reorganized: Option<ReorganizeReport>,
        metadata_files: usize,
    },
    /// Only the state was copied, as requested.
    StateMoved { target: DataSource, state: CopyReport },
    /// The project was already at v3.
    AlreadyCurrent,
    /// The operator declined to continue. Nothing was changed.
    Declined,
}

enum Preflight {
    Proceed {
        target: DataSource,
        resume: Option<Checkpoint>,
    },
    Done(UpgradeOutcome),
}

/// Collaborators an upgrade runs against.
pub struct UpgradeContext<'a> {
    pub fs: &'a dyn Filesystem,
    pub metadata: &'a dyn MetadataApi,
    pub catalog: &'a dyn CatalogStateApi,
    /// The legacy bookkeeping tables.
    pub table: &'a mut dyn StateStore,
    pub config_writer: &'a dyn ConfigWriter,
    pub prompter: &'a dyn Prompter,
    pub progress: &'a dyn ProgressReporter,
}

impl UpgradeContext<'_> {
    /// Upgrades the project described by `config` and `options` to v3.
    ///
    /// On success `config` holds the committed v3 config. On failure the
    /// error names the step that failed; `config` keeps its old version
    /// unless the failure came after the config write.
    pub fn upgrade_project(
        &mut self,
        config: &mut ProjectConfig,
        options: &UpgradeOptions,
    ) -> Result<UpgradeOutcome, UpgradeError> {
        let checkpoints = CheckpointStore::new(self.fs, options.layout.checkpoint_file());

        self.progress.step_started(UpgradeStep::Preflight);
        let (target, resume) = match self
            .preflight(config, options, &checkpoints)
            .map_err(UpgradeError::in_step(UpgradeStep::Preflight))?
        {
            Preflight::Proceed { target, resume } => (target, resume),
            Preflight::Done(outcome) => return Ok(outcome),
        };
        self.progress.step_finished(UpgradeStep::Preflight);
        let reached = |stage: CheckpointStage| resume.as_ref().is_some_and(|c| c.reached(stage));

        let state = if reached(CheckpointStage::StateCopied) {
            info!(target = %target, "state already copied, resuming");
            None
        } else {
            let step = UpgradeStep::CopyState;
            self.progress.step_started(step);
            let mut catalog = CatalogStore::new(self.catalog);
            let copied_earlier = !options.move_state_only
                && state_already_copied(&*self.table, &catalog, &target, &target)
                    .map_err(UpgradeError::in_step(step))?;
            let report = if copied_earlier {
                info!(target = %target, "state was copied by an earlier run, skipping copy");
                None
            } else {
                let report = copy_state(&mut *self.table, &mut catalog, &target, &target)
                    .map_err(UpgradeError::in_step(step))?;
                if options.move_state_only {
                    self.progress.step_finished(step);
                    debug!("move state only is set, stopping after state copy");
                    return Ok(UpgradeOutcome::StateMoved {
                        target,
                        state: report,
                    });
                }
                Some(report)
            };
            checkpoints
                .save(&Checkpoint {
                    target: target.clone(),
                    stage: CheckpointStage::StateCopied,
                })
                .map_err(UpgradeError::in_step(step))?;
            self.progress.step_finished(step);
            report
        };

        let reorganized = if reached(CheckpointStage::DirectoriesReorganized) {
            info!(target = %target, "directories already reorganized, resuming");
            None
        } else {
            let step = UpgradeStep::Reorganize;
            self.progress.step_started(step);
            let report = reorganize(self.fs, &options.layout, &target)
                .map_err(UpgradeError::in_step(step))?;
            checkpoints
                .save(&Checkpoint {
                    target: target.clone(),
                    stage: CheckpointStage::DirectoriesReorganized,
                })
                .map_err(UpgradeError::in_step(step))?;
            self.progress.step_finished(step);
            Some(report)
        };

        let step = UpgradeStep::WriteConfig;
        self.progress.step_started(step);
        rewrite_version(config, TARGET_VERSION, self.config_writer)
            .map_err(UpgradeError::in_step(step))?;
        checkpoints.clear().map_err(UpgradeError::in_step(step))?;
        self.progress.step_finished(step);

        let step = UpgradeStep::ResyncMetadata;
        self.progress.step_started(step);
        let files = resync_metadata(self.fs, self.metadata, &options.layout.metadata_dir)
            .map_err(UpgradeError::in_step(step))?;
        self.progress.step_finished(step);

        info!(target = %target, "project upgraded to config {}", TARGET_VERSION);
        Ok(UpgradeOutcome::Upgraded {
            target,
            state,
            reorganized,
            metadata_files: files.files.len(),
        })
    }

    /// Checks preconditions and picks the target.
    fn preflight(
        &self,
        config: &ProjectConfig,
        options: &UpgradeOptions,
        checkpoints: &CheckpointStore<'_, dyn Filesystem + '_>,
    ) -> Result<Preflight, StepError> {
        if config.version < ProjectSchemaVersion::V2 && !options.move_state_only {
            return Err(StepError::Precondition(format!(
                "project should be using config {} to be able to update to {}",
                ProjectSchemaVersion::V2,
                TARGET_VERSION
            )));
        }

        let supports_metadata_v3 = self.metadata.supports_metadata_v3()?;
        let sources = list_sources(&self.metadata.export_metadata()?)?;
        let decision = evaluate(&GateInput {
            current: config.version,
            target: TARGET_VERSION,
            sources: &sources,
            supports_metadata_v3,
            state_only: options.move_state_only,
        })?;
        if decision == GateDecision::NoUpgradeNeeded {
            info!("project is already using config {}", config.version);
            let stale = checkpoints.load().unwrap_or_else(|err| {
                warn!(%err, "unreadable upgrade checkpoint");
                None
            });
            if let Some(stale) = stale {
                warn!(
                    target = %stale.target,
                    "found a leftover upgrade checkpoint; metadata may not have been re-exported, \
                     run `stratum resync-metadata`"
                );
            }
            checkpoints.clear()?;
            return Ok(Preflight::Done(UpgradeOutcome::AlreadyCurrent));
        }

        let report = self.metadata.get_inconsistent_metadata()?;
        if !report.is_consistent {
            return Err(StepError::Precondition(
                "cannot continue: metadata is inconsistent on the server".to_string(),
            ));
        }

        let resume = checkpoints.load()?;
        if let Some(checkpoint) = &resume {
            if options.move_state_only {
                return Err(StepError::Checkpoint(format!(
                    "an upgrade to '{}' is in progress, re-run it without move-state-only",
                    checkpoint.target
                )));
            }
            if let Some(explicit) = &options.target_source {
                if *explicit != checkpoint.target {
                    return Err(StepError::Checkpoint(format!(
                        "an upgrade to '{}' is in progress, cannot switch to '{}'",
                        checkpoint.target, explicit
                    )));
                }
            }
            info!(target = %checkpoint.target, stage = ?checkpoint.stage, "resuming interrupted upgrade");
        }

        info!(
            "The upgrade process will make some changes to your project directory, \
             it is advised to create a backup project directory before continuing"
        );
        warn!("During the update process the server is the source of truth, make sure it is up to date");
        warn!("The update process replaces project metadata with metadata on the server");

        if !options.force {
            let proceed = self
                .prompter
                .confirm("continue?")
                .map_err(StepError::Prompt)?;
            if !proceed {
                info!("upgrade declined");
                return Ok(Preflight::Done(UpgradeOutcome::Declined));
            }
        }

        let explicit = resume
            .as_ref()
            .map(|c| &c.target)
            .or(options.target_source.as_ref());
        match resolve_target(decision, explicit, &sources, self.prompter)? {
            Some(target) => Ok(Preflight::Proceed { target, resume }),
            None => Ok(Preflight::Done(UpgradeOutcome::AlreadyCurrent)),
        }
    }
}
