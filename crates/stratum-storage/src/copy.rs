//! State transplant from the legacy table store into the catalog.
//!
//! [`copy_state`] copies one source's migration records and the migration
//! settings out of a [`TableStore`](crate::TableStore)-like store into a
//! [`CatalogStore`], re-associating the records with the destination name,
//! then sets the catalog's state-copy latch.
//!
//! The two copies are independent: a settings failure leaves the already
//! copied migration records in place and the latch unset. Re-running after
//! such a failure hits [`StorageError::DuplicateState`], so recovery is a
//! manual decision.

use std::collections::BTreeSet;

use tracing::{debug, info};

use stratum_core::DataSource;

use crate::catalog::CatalogStore;
use crate::error::StorageError;
use crate::traits::{CatalogStateApi, MigrationsStateStore, SettingsStateStore};

/// What a successful [`copy_state`] moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CopyReport {
    pub migrations: usize,
    pub settings: usize,
}

/// Copies migration records of `source` in `src` to `dest` in `dst`.
///
/// This is a rename, not a merge: if `dst` already has any record for
/// `dest` the copy fails with [`StorageError::DuplicateState`] and writes
/// nothing.
pub fn copy_migration_state<S, D>(
    src: &S,
    dst: &mut D,
    source: &DataSource,
    dest: &DataSource,
) -> Result<usize, StorageError>
where
    S: MigrationsStateStore + ?Sized,
    D: MigrationsStateStore + ?Sized,
{
    if dst.has_versions(dest)? {
        return Err(StorageError::DuplicateState {
            target: dest.to_string(),
        });
    }
    let records: Vec<_> = src
        .get_versions(source)?
        .iter()
        .map(|r| r.renamed(dest))
        .collect();
    if records.is_empty() {
        return Ok(0);
    }
    dst.set_versions(dest, &records)?;
    Ok(records.len())
}

/// Copies every setting from `src` to `dst`, overwriting existing keys.
pub fn copy_settings_state<S, D>(src: &S, dst: &mut D) -> Result<usize, StorageError>
where
    S: SettingsStateStore + ?Sized,
    D: SettingsStateStore + ?Sized,
{
    let settings = src.get_settings()?;
    if settings.is_empty() {
        return Ok(0);
    }
    dst.set_settings(&settings)?;
    Ok(settings.len())
}

/// Returns true when an earlier copy already moved `source` into `dest`.
///
/// That is the case when the catalog latch is set and every version the
/// table holds for `source` is recorded under `dest`. A set latch with
/// missing versions means the catalog state came from somewhere else.
pub fn state_already_copied<T, A>(
    table: &T,
    catalog: &CatalogStore<A>,
    source: &DataSource,
    dest: &DataSource,
) -> Result<bool, StorageError>
where
    T: MigrationsStateStore + ?Sized,
    A: CatalogStateApi,
{
    if !catalog.is_state_copy_completed()? {
        return Ok(false);
    }
    let copied: BTreeSet<_> = catalog
        .get_versions(dest)?
        .into_iter()
        .map(|r| r.version)
        .collect();
    Ok(table
        .get_versions(source)?
        .iter()
        .all(|r| copied.contains(&r.version)))
}

/// Transplants the state of `source` from `table` into `catalog` as `dest`.
///
/// Fails fast with [`StorageError::StateCopyAlreadyCompleted`] when the
/// catalog latch is already set.
pub fn copy_state<T, A>(
    table: &mut T,
    catalog: &mut CatalogStore<A>,
    source: &DataSource,
    dest: &DataSource,
) -> Result<CopyReport, StorageError>
where
    T: MigrationsStateStore + SettingsStateStore + ?Sized,
    A: CatalogStateApi,
{
    table.prepare_migrations_state_store(source)?;
    catalog.prepare_migrations_state_store(dest)?;
    if catalog.is_state_copy_completed()? {
        return Err(StorageError::StateCopyAlreadyCompleted);
    }

    debug!(source = %source, dest = %dest, "copying migration state");
    let migrations = copy_migration_state(&*table, catalog, source, dest)?;

    table.prepare_settings_driver()?;
    catalog.prepare_settings_driver()?;
    debug!("copying settings state");
    let settings = copy_settings_state(&*table, catalog)?;

    catalog.mark_state_copy_completed()?;
    info!(
        dest = %dest,
        migrations,
        settings,
        "copied state into catalog"
    );
    Ok(CopyReport {
        migrations,
        settings,
    })
}
