//! Operator-facing collaborators: prompting and progress.

use std::fmt;
use std::io;

use tracing::{debug, info};

/// Steps of the upgrade pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UpgradeStep {
    Preflight,
    CopyState,
    Reorganize,
    WriteConfig,
    ResyncMetadata,
}

impl fmt::Display for UpgradeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UpgradeStep::Preflight => "checking preconditions",
            UpgradeStep::CopyState => "copying state from legacy tables",
            UpgradeStep::Reorganize => "moving migrations and seeds",
            UpgradeStep::WriteConfig => "writing config file",
            UpgradeStep::ResyncMetadata => "exporting metadata from server",
        };
        f.write_str(name)
    }
}

/// Interactive questions asked during an upgrade.
pub trait Prompter {
    /// Yes/no question; `Ok(false)` means the operator declined.
    fn confirm(&self, question: &str) -> io::Result<bool>;

    /// Pick one of `options`; `Ok(None)` when no answer can be given.
    fn select_one(&self, question: &str, options: &[String]) -> io::Result<Option<String>>;
}

/// Prompter for unattended runs: never selects, and refuses to answer a
/// confirmation so that a run without `force` fails instead of silently
/// doing nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NonInteractive;

impl Prompter for NonInteractive {
    fn confirm(&self, question: &str) -> io::Result<bool> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("cannot ask '{question}' in an unattended run, pass --force to proceed"),
        ))
    }

    fn select_one(&self, _question: &str, _options: &[String]) -> io::Result<Option<String>> {
        Ok(None)
    }
}

/// Receives step-boundary notifications. Never consulted for control flow.
pub trait ProgressReporter {
    fn step_started(&self, step: UpgradeStep);

    fn step_finished(&self, step: UpgradeStep);
}

/// Reports progress through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressReporter for TracingProgress {
    fn step_started(&self, step: UpgradeStep) {
        info!("{}...", step);
    }

    fn step_finished(&self, step: UpgradeStep) {
        debug!(%step, "completed");
    }
}
