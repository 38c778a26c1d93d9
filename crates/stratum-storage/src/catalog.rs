//! Catalog-backed implementation of the state store traits.
//!
//! [`CatalogStore`] keeps migrations and settings inside the backend-owned
//! catalog blob. The blob can only be fetched and replaced whole, so every
//! write is a read-modify-write of the entire state. Nothing here guards
//! against another writer racing between the read and the write; callers
//! must hold exclusive access to the project for the duration.

use tracing::debug;

use stratum_core::{CatalogState, DataSource, MigrationVersion, MigrationVersionRecord, SettingsRecord};

use crate::error::StorageError;
use crate::traits::{CatalogStateApi, MigrationsStateStore, SettingsStateStore};

const STORE: &str = "catalog";

/// State store over a [`CatalogStateApi`].
#[derive(Debug)]
pub struct CatalogStore<A> {
    api: A,
}

impl<A: CatalogStateApi> CatalogStore<A> {
    pub fn new(api: A) -> Self {
        CatalogStore { api }
    }

    /// Fetches the current catalog state.
    pub fn state(&self) -> Result<CatalogState, StorageError> {
        self.api.get().map_err(|e| match e {
            StorageError::Io { .. } | StorageError::Unavailable { .. } => e,
            other => StorageError::io(STORE, other),
        })
    }

    /// Returns the state-copy latch.
    pub fn is_state_copy_completed(&self) -> Result<bool, StorageError> {
        Ok(self.state()?.is_state_copy_completed)
    }

    /// Sets the state-copy latch. There is no way to clear it again.
    pub fn mark_state_copy_completed(&self) -> Result<(), StorageError> {
        self.update(|state| {
            state.is_state_copy_completed = true;
            Ok(())
        })
    }

    /// Fetches the state, applies `mutate`, and writes the result back.
    ///
    /// Nothing is written if `mutate` fails.
    fn update<F>(&self, mutate: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut CatalogState) -> Result<(), StorageError>,
    {
        let mut state = self.state()?;
        mutate(&mut state)?;
        self.api.set(&state)
    }

    fn probe(&self) -> Result<(), StorageError> {
        self.api
            .get()
            .map(|_| ())
            .map_err(|e| StorageError::unavailable(STORE, e))
    }
}

impl<A: CatalogStateApi> MigrationsStateStore for CatalogStore<A> {
    fn prepare_migrations_state_store(&mut self, source: &DataSource) -> Result<(), StorageError> {
        debug!(source = %source, "preparing catalog migrations store");
        self.probe()
    }

    fn get_versions(&self, source: &DataSource) -> Result<Vec<MigrationVersionRecord>, StorageError> {
        Ok(self.state()?.migration_records(source))
    }

    fn has_versions(&self, source: &DataSource) -> Result<bool, StorageError> {
        Ok(self.state()?.has_migrations_for(source))
    }

    fn set_version(
        &mut self,
        source: &DataSource,
        version: MigrationVersion,
        dirty: bool,
    ) -> Result<(), StorageError> {
        let record = MigrationVersionRecord {
            source: source.clone(),
            version,
            dirty,
        };
        self.update(|state| {
            state.insert_migration(&record);
            Ok(())
        })
    }

    fn set_versions(
        &mut self,
        source: &DataSource,
        records: &[MigrationVersionRecord],
    ) -> Result<(), StorageError> {
        self.update(|state| {
            for record in records {
                state.insert_migration(&record.renamed(source));
            }
            Ok(())
        })
    }

    fn remove_version(
        &mut self,
        source: &DataSource,
        version: MigrationVersion,
    ) -> Result<(), StorageError> {
        self.update(|state| {
            state.remove_migration(source, version);
            Ok(())
        })
    }
}

impl<A: CatalogStateApi> SettingsStateStore for CatalogStore<A> {
    fn prepare_settings_driver(&mut self) -> Result<(), StorageError> {
        debug!("preparing catalog settings store");
        self.probe()
    }

    fn get_settings(&self) -> Result<Vec<SettingsRecord>, StorageError> {
        Ok(self.state()?.settings_records())
    }

    fn get_setting(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.state()?.settings.get(key).cloned())
    }

    fn set_setting(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.update(|state| {
            state.settings.insert(key.to_string(), value.to_string());
            Ok(())
        })
    }

    fn set_settings(&mut self, records: &[SettingsRecord]) -> Result<(), StorageError> {
        self.update(|state| {
            for record in records {
                state.settings.insert(record.key.clone(), record.value.clone());
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryCatalog;

    #[test]
    fn prepare_fails_when_endpoint_is_down() {
        let catalog = InMemoryCatalog::new();
        catalog.set_available(false);
        let mut store = CatalogStore::new(&catalog);
        let err = store
            .prepare_migrations_state_store(&DataSource::default_source())
            .unwrap_err();
        assert!(matches!(err, StorageError::Unavailable { store: "catalog", .. }));
        assert!(matches!(
            store.prepare_settings_driver(),
            Err(StorageError::Unavailable { .. })
        ));
    }

    #[test]
    fn bulk_write_is_a_single_round_trip() {
        let catalog = InMemoryCatalog::new();
        let mut store = CatalogStore::new(&catalog);
        let source = DataSource::new("pg").unwrap();
        let records: Vec<_> = (0..5)
            .map(|i| MigrationVersionRecord {
                source: DataSource::default_source(),
                version: MigrationVersion(1_610_000_000_000 + i),
                dirty: i == 4,
            })
            .collect();
        store.set_versions(&source, &records).unwrap();

        assert_eq!(catalog.write_count(), 1);
        let stored = store.get_versions(&source).unwrap();
        assert_eq!(stored.len(), 5);
        assert!(stored.iter().all(|r| r.source == source));
        assert!(stored[4].dirty);
        assert!(store
            .get_versions(&DataSource::default_source())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn writes_preserve_unrelated_sections() {
        let mut initial = CatalogState::default();
        initial.settings.insert("keep".into(), "me".into());
        let catalog = InMemoryCatalog::with_state(initial);
        let mut store = CatalogStore::new(&catalog);
        let source = DataSource::default_source();

        store.set_version(&source, MigrationVersion(1_610_000_000_000), false).unwrap();
        store.set_setting("migration_mode", "true").unwrap();
        store.remove_version(&source, MigrationVersion(1_610_000_000_000)).unwrap();

        let state = catalog.snapshot();
        assert_eq!(state.settings.get("keep").map(String::as_str), Some("me"));
        assert_eq!(
            store.get_setting("migration_mode").unwrap().as_deref(),
            Some("true")
        );
        assert_eq!(state.migration_count(), 0);
    }

    #[test]
    fn latch_is_read_from_backend_state() {
        let catalog = InMemoryCatalog::new();
        let store = CatalogStore::new(&catalog);
        assert!(!store.is_state_copy_completed().unwrap());
        store.mark_state_copy_completed().unwrap();
        assert!(store.is_state_copy_completed().unwrap());
        assert!(catalog.snapshot().is_state_copy_completed);
    }

    #[test]
    fn unparsable_keys_still_count_as_versions() {
        let mut initial = CatalogState::default();
        initial
            .migrations
            .entry("default".into())
            .or_default()
            .insert("not-a-version".into(), false);
        let catalog = InMemoryCatalog::with_state(initial);
        let store = CatalogStore::new(&catalog);
        let source = DataSource::default_source();

        assert!(store.get_versions(&source).unwrap().is_empty());
        assert!(store.has_versions(&source).unwrap());
        assert!(!store.has_versions(&DataSource::new("pg").unwrap()).unwrap());
    }

    #[test]
    fn failed_write_surfaces_io_error() {
        let catalog = InMemoryCatalog::new();
        catalog.set_reject_writes(true);
        let mut store = CatalogStore::new(&catalog);
        let err = store.set_setting("k", "v").unwrap_err();
        assert!(matches!(err, StorageError::Io { store: "catalog", .. }));
    }
}
