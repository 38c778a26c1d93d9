//! Store traits shared by the legacy table layout and the catalog blob.
//!
//! The upgrade composes stores through these traits only, so the transplant
//! never knows which concrete backend it is reading from or writing to.
//! Every method is synchronous and single-attempt; retry policy belongs to
//! whatever transport sits underneath.

use stratum_core::{CatalogState, DataSource, MigrationVersion, MigrationVersionRecord, SettingsRecord};

use crate::error::StorageError;

/// Applied-migration bookkeeping for one or more data sources.
pub trait MigrationsStateStore {
    /// Checks that the store can serve `source`.
    ///
    /// Fails with [`StorageError::Unavailable`]. Never creates tables or
    /// state on the caller's behalf.
    fn prepare_migrations_state_store(&mut self, source: &DataSource) -> Result<(), StorageError>;

    /// Returns every applied version for `source`, in version order.
    fn get_versions(&self, source: &DataSource) -> Result<Vec<MigrationVersionRecord>, StorageError>;

    /// Returns true if anything is recorded for `source`.
    ///
    /// Backends holding entries that do not read back as versions override
    /// this so those entries still count.
    fn has_versions(&self, source: &DataSource) -> Result<bool, StorageError> {
        Ok(!self.get_versions(source)?.is_empty())
    }

    /// Records a single version.
    fn set_version(
        &mut self,
        source: &DataSource,
        version: MigrationVersion,
        dirty: bool,
    ) -> Result<(), StorageError>;

    /// Records several versions at once.
    ///
    /// Backends with expensive writes override this to batch.
    fn set_versions(
        &mut self,
        source: &DataSource,
        records: &[MigrationVersionRecord],
    ) -> Result<(), StorageError> {
        for record in records {
            self.set_version(source, record.version, record.dirty)?;
        }
        Ok(())
    }

    /// Forgets a version.
    fn remove_version(
        &mut self,
        source: &DataSource,
        version: MigrationVersion,
    ) -> Result<(), StorageError>;
}

/// Migration settings such as `migration_mode`.
pub trait SettingsStateStore {
    /// Checks that settings can be read and written.
    fn prepare_settings_driver(&mut self) -> Result<(), StorageError>;

    /// Returns every stored setting.
    fn get_settings(&self) -> Result<Vec<SettingsRecord>, StorageError>;

    fn get_setting(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set_setting(&mut self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Writes several settings at once.
    fn set_settings(&mut self, records: &[SettingsRecord]) -> Result<(), StorageError> {
        for record in records {
            self.set_setting(&record.key, &record.value)?;
        }
        Ok(())
    }
}

/// A store serving both migrations and settings, as the legacy tables do.
pub trait StateStore: MigrationsStateStore + SettingsStateStore {}

impl<T: MigrationsStateStore + SettingsStateStore + ?Sized> StateStore for T {}

/// The backend's catalog state endpoint.
///
/// The blob is owned by the backend: it can only be fetched whole and
/// replaced whole. Writers must be serialized by the caller.
pub trait CatalogStateApi {
    fn get(&self) -> Result<CatalogState, StorageError>;

    fn set(&self, state: &CatalogState) -> Result<(), StorageError>;
}

impl<T: CatalogStateApi + ?Sized> CatalogStateApi for &T {
    fn get(&self) -> Result<CatalogState, StorageError> {
        (**self).get()
    }

    fn set(&self, state: &CatalogState) -> Result<(), StorageError> {
        (**self).set(state)
    }
}
