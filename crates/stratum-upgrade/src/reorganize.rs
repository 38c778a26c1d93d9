//! Moves migrations and seeds under a per-source subdirectory.
//!
//! The move is copy-then-delete: every matched entry is copied into
//! `<root>/<target>/` and its digest checked against the original before
//! any original is removed. A failure anywhere in the copy phase leaves
//! every original in place; at worst the target subtrees hold partial
//! copies that the next run overwrites.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use stratum_core::{is_migration_name, DataSource};

use crate::error::StepError;
use crate::fs::{DirEntry, EntryKind, Filesystem};
use crate::layout::ProjectLayout;

/// Pre-v3 metadata files that the per-source layout no longer uses.
pub const LEGACY_METADATA_FILES: [&str; 2] = ["tables.yaml", "functions.yaml"];

/// What a successful [`reorganize`] moved and removed, by entry name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReorganizeReport {
    pub migrations: Vec<String>,
    pub seeds: Vec<String>,
    pub removed_metadata: Vec<String>,
}

/// Lists the entries of `root` whose names follow the migration convention.
pub fn scan_migrations<F: Filesystem + ?Sized>(
    fs: &F,
    root: &Path,
) -> Result<Vec<DirEntry>, StepError> {
    let entries = fs.read_dir(root).map_err(|source| StepError::DirectoryScan {
        path: root.to_path_buf(),
        source,
    })?;
    Ok(entries
        .into_iter()
        .filter(|e| is_migration_name(&e.name))
        .collect())
}

/// Lists the seed files directly under `root`. A missing root has no seeds.
pub fn scan_seeds<F: Filesystem + ?Sized>(fs: &F, root: &Path) -> Result<Vec<DirEntry>, StepError> {
    match fs.read_dir(root) {
        Ok(entries) => Ok(entries.into_iter().filter(|e| !e.is_dir()).collect()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %root.display(), "no seeds directory");
            Ok(Vec::new())
        }
        Err(source) => Err(StepError::DirectoryScan {
            path: root.to_path_buf(),
            source,
        }),
    }
}

struct PlannedMove {
    from: PathBuf,
    to: PathBuf,
    kind: EntryKind,
}

fn plan(root: &Path, target_dir: &Path, entries: &[DirEntry]) -> Vec<PlannedMove> {
    entries
        .iter()
        .map(|e| PlannedMove {
            from: root.join(&e.name),
            to: target_dir.join(&e.name),
            kind: e.kind,
        })
        .collect()
}

/// Moves matched migrations and seeds of the project into `target`'s
/// subdirectories and removes the legacy metadata files.
pub fn reorganize<F: Filesystem + ?Sized>(
    fs: &F,
    layout: &ProjectLayout,
    target: &DataSource,
) -> Result<ReorganizeReport, StepError> {
    let migrations = scan_migrations(fs, &layout.migrations_dir)?;
    let seeds = scan_seeds(fs, &layout.seeds_dir)?;

    let migrations_target = layout.migrations_dir.join(target.name());
    let seeds_target = layout.seeds_dir.join(target.name());
    for dir in [&migrations_target, &seeds_target] {
        fs.create_dir_all(dir).map_err(|source| StepError::Copy {
            from: PathBuf::new(),
            to: dir.clone(),
            source,
        })?;
    }

    let mut moves = plan(&layout.migrations_dir, &migrations_target, &migrations);
    moves.extend(plan(&layout.seeds_dir, &seeds_target, &seeds));

    for planned in &moves {
        copy_verified(fs, planned).map_err(|source| StepError::Copy {
            from: planned.from.clone(),
            to: planned.to.clone(),
            source,
        })?;
    }
    debug!(copied = moves.len(), "all entries copied and verified");

    for planned in &moves {
        fs.remove_all(&planned.from)
            .map_err(|source| StepError::Cleanup {
                path: planned.from.clone(),
                source,
            })?;
    }

    let mut removed_metadata = Vec::new();
    for name in LEGACY_METADATA_FILES {
        let path = layout.metadata_dir.join(name);
        if !fs.exists(&path) {
            continue;
        }
        fs.remove_all(&path)
            .map_err(|source| StepError::Cleanup { path, source })?;
        removed_metadata.push(name.to_string());
    }

    let report = ReorganizeReport {
        migrations: migrations.into_iter().map(|e| e.name).collect(),
        seeds: seeds.into_iter().map(|e| e.name).collect(),
        removed_metadata,
    };
    info!(
        target = %target,
        migrations = report.migrations.len(),
        seeds = report.seeds.len(),
        "moved migrations and seeds"
    );
    Ok(report)
}

fn copy_verified<F: Filesystem + ?Sized>(fs: &F, planned: &PlannedMove) -> io::Result<()> {
    match planned.kind {
        EntryKind::Dir => fs.copy_dir(&planned.from, &planned.to)?,
        EntryKind::File => fs.copy_file(&planned.from, &planned.to)?,
    }
    let expected = digest(fs, &planned.from)?;
    let actual = digest(fs, &planned.to)?;
    if expected != actual {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("copy of {} does not match the original", planned.from.display()),
        ));
    }
    Ok(())
}

/// Content digest of a file or directory tree, independent of its location.
fn digest<F: Filesystem + ?Sized>(fs: &F, path: &Path) -> io::Result<blake3::Hash> {
    let mut hasher = blake3::Hasher::new();
    hash_entry(fs, path, &mut hasher)?;
    Ok(hasher.finalize())
}

fn hash_entry<F: Filesystem + ?Sized>(
    fs: &F,
    path: &Path,
    hasher: &mut blake3::Hasher,
) -> io::Result<()> {
    match fs.stat(path)? {
        EntryKind::File => {
            let contents = fs.read_file(path)?;
            hasher.update(b"f");
            hasher.update(&(contents.len() as u64).to_le_bytes());
            hasher.update(&contents);
        }
        EntryKind::Dir => {
            let children = fs.read_dir(path)?;
            hasher.update(b"d");
            hasher.update(&(children.len() as u64).to_le_bytes());
            for child in children {
                hasher.update(&(child.name.len() as u64).to_le_bytes());
                hasher.update(child.name.as_bytes());
                hash_entry(fs, &path.join(&child.name), hasher)?;
            }
        }
    }
    Ok(())
}
