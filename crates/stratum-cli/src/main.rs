//! Stratum project tooling CLI.
//!
//! Provides the `stratum` binary with subcommands for maintaining a
//! project directory against its backend:
//!
//! - `update-project-v3` moves a config v2 project to the per-source v3
//!   layout, copying the legacy state into the backend catalog.
//! - `resync-metadata` replaces the local metadata directory with the
//!   server's metadata.
//!
//! Failures print `Error: ...` on stderr and exit with a code that
//! identifies the kind of failure.

mod client;
mod prompt;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use stratum_core::DataSource;
use stratum_storage::TableStore;
use stratum_upgrade::{
    check_layout_is_current, list_sources, resync_metadata, FsConfigWriter, MetadataApi,
    NonInteractive, OsFs, ProjectConfig, ProjectLayout, Prompter, StepError, TracingProgress,
    UpgradeContext, UpgradeOptions, UpgradeOutcome,
};

use crate::client::HttpClient;
use crate::prompt::LinePrompter;

/// Exit code for bad arguments or an unreadable project.
const EXIT_USAGE: i32 = 1;

/// Stratum project tooling.
#[derive(Parser)]
#[command(name = "stratum", about = "Stratum project tooling")]
struct Cli {
    /// Log filter, e.g. `info` or `stratum_upgrade=debug`. `RUST_LOG` wins.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by commands that talk to the backend.
#[derive(Args)]
struct ProjectArgs {
    /// Project directory containing config.yaml.
    #[arg(long, default_value = ".")]
    project: PathBuf,

    /// Backend endpoint (default: from config.yaml).
    #[arg(long, env = "STRATUM_ENDPOINT")]
    endpoint: Option<String>,

    /// Admin secret for the backend (default: from config.yaml).
    #[arg(long, env = "STRATUM_ADMIN_SECRET", hide_env_values = true)]
    admin_secret: Option<String>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Update a config v2 project to config v3.
    UpdateProjectV3 {
        #[command(flatten)]
        project: ProjectArgs,

        /// SQLite database holding the legacy migration state tables.
        #[arg(long, env = "STRATUM_STATE_DB")]
        state_db: String,

        /// Database the current migrations and seeds belong to.
        #[arg(long)]
        database_name: Option<String>,

        /// Do not ask for confirmation.
        #[arg(long)]
        force: bool,

        /// Only copy the migration state into the catalog.
        #[arg(long)]
        move_state_only: bool,

        /// Never prompt; fail when the database cannot be determined or
        /// confirmation is needed without --force.
        #[arg(long)]
        non_interactive: bool,
    },

    /// Replace local metadata files with the server's metadata.
    ResyncMetadata {
        #[command(flatten)]
        project: ProjectArgs,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let exit_code = match cli.command {
        Commands::UpdateProjectV3 {
            project,
            state_db,
            database_name,
            force,
            move_state_only,
            non_interactive,
        } => run_update_project_v3(
            &project,
            &state_db,
            database_name.as_deref(),
            force,
            move_state_only,
            non_interactive,
        ),
        Commands::ResyncMetadata { project } => run_resync_metadata(&project),
    };
    process::exit(exit_code);
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// A loaded project and a client for its backend.
struct Session {
    config: ProjectConfig,
    layout: ProjectLayout,
    client: HttpClient,
}

fn open_session(args: &ProjectArgs) -> Result<Session, String> {
    let root = args.project.as_path();
    let config_path = root.join(stratum_upgrade::config::CONFIG_FILE_NAME);
    let config = ProjectConfig::load(&OsFs, &config_path)
        .map_err(|e| format!("failed to read project config: {}", e))?;

    let endpoint = args
        .endpoint
        .clone()
        .or_else(|| config.endpoint.clone())
        .ok_or_else(|| "no endpoint given: pass --endpoint or set it in config.yaml".to_string())?;
    let admin_secret = args
        .admin_secret
        .clone()
        .or_else(|| config.admin_secret.clone());

    let layout = ProjectLayout::from_config(root, &config);
    Ok(Session {
        config,
        layout,
        client: HttpClient::new(&endpoint, admin_secret),
    })
}

/// Execute the update-project-v3 subcommand.
///
/// Returns 0 on success, [`EXIT_USAGE`] for bad input, or the failed
/// step's exit code.
fn run_update_project_v3(
    args: &ProjectArgs,
    state_db: &str,
    database_name: Option<&str>,
    force: bool,
    move_state_only: bool,
    non_interactive: bool,
) -> i32 {
    let session = match open_session(args) {
        Ok(s) => s,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return EXIT_USAGE;
        }
    };

    let target_source = match database_name.map(DataSource::new).transpose() {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Error: --database-name: {}", e);
            return EXIT_USAGE;
        }
    };

    let mut table = match TableStore::open(state_db) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Error: failed to open state database '{}': {}", state_db, e);
            return StepError::from(e).exit_code();
        }
    };

    let Session {
        mut config,
        layout,
        client,
    } = session;
    let writer = FsConfigWriter::new(&OsFs, layout.config_file.clone());
    let terminal = LinePrompter::stdio();
    let prompter: &dyn Prompter = if non_interactive {
        &NonInteractive
    } else {
        &terminal
    };
    let options = UpgradeOptions {
        layout,
        force,
        target_source,
        move_state_only,
    };

    let mut ctx = UpgradeContext {
        fs: &OsFs,
        metadata: &client,
        catalog: &client,
        table: &mut table,
        config_writer: &writer,
        prompter,
        progress: &TracingProgress,
    };

    match ctx.upgrade_project(&mut config, &options) {
        Ok(outcome) => {
            report_outcome(&outcome);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

fn report_outcome(outcome: &UpgradeOutcome) {
    match outcome {
        UpgradeOutcome::Upgraded {
            target,
            state,
            reorganized,
            metadata_files,
        } => {
            println!("Project updated to config v3 for database '{}'", target);
            if let Some(state) = state {
                println!(
                    "  state: {} migration versions, {} settings",
                    state.migrations, state.settings
                );
            }
            if let Some(moved) = reorganized {
                println!(
                    "  moved: {} migrations, {} seeds",
                    moved.migrations.len(),
                    moved.seeds.len()
                );
            }
            println!("  metadata: {} files", metadata_files);
        }
        UpgradeOutcome::StateMoved { target, state } => {
            println!(
                "Copied state for database '{}': {} migration versions, {} settings",
                target, state.migrations, state.settings
            );
        }
        UpgradeOutcome::AlreadyCurrent => println!("Project is already using config v3"),
        UpgradeOutcome::Declined => println!("Aborted, nothing was changed"),
    }
}

/// Execute the resync-metadata subcommand.
fn run_resync_metadata(args: &ProjectArgs) -> i32 {
    let session = match open_session(args) {
        Ok(s) => s,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return EXIT_USAGE;
        }
    };

    match resync(&session, &session.layout.metadata_dir) {
        Ok(count) => {
            println!("Wrote {} metadata files", count);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

fn resync(session: &Session, metadata_dir: &Path) -> Result<usize, StepError> {
    let supports_metadata_v3 = session.client.supports_metadata_v3()?;
    let sources = list_sources(&session.client.export_metadata()?)?;
    check_layout_is_current(session.config.version, &sources, supports_metadata_v3)?;
    let files = resync_metadata(&OsFs, &session.client, metadata_dir)?;
    Ok(files.files.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_update_flags() {
        let cli = Cli::try_parse_from([
            "stratum",
            "update-project-v3",
            "--project",
            "/tmp/p",
            "--endpoint",
            "http://localhost:8080",
            "--state-db",
            "state.db",
            "--database-name",
            "analytics",
            "--force",
        ])
        .unwrap();
        match cli.command {
            Commands::UpdateProjectV3 {
                project,
                state_db,
                database_name,
                force,
                move_state_only,
                ..
            } => {
                assert_eq!(project.project, PathBuf::from("/tmp/p"));
                assert_eq!(state_db, "state.db");
                assert_eq!(database_name.as_deref(), Some("analytics"));
                assert!(force);
                assert!(!move_state_only);
            }
            Commands::ResyncMetadata { .. } => panic!("wrong subcommand"),
        }
    }

    #[test]
    fn session_reads_endpoint_from_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.yaml"),
            "version: 2\nendpoint: http://localhost:9090\nadmin_secret: s3cret\n",
        )
        .unwrap();
        let args = ProjectArgs {
            project: dir.path().to_path_buf(),
            endpoint: None,
            admin_secret: None,
        };
        let session = open_session(&args).unwrap();
        assert_eq!(session.layout.migrations_dir, dir.path().join("migrations"));
        assert_eq!(session.config.endpoint.as_deref(), Some("http://localhost:9090"));
    }

    #[test]
    fn session_requires_an_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.yaml"), "version: 2\n").unwrap();
        let args = ProjectArgs {
            project: dir.path().to_path_buf(),
            endpoint: None,
            admin_secret: None,
        };
        assert!(open_session(&args).is_err());
    }
}
