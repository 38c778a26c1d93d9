//! Backend-owned CLI catalog state.
//!
//! The backend stores one JSON blob per client type; the CLI's blob tracks
//! applied migrations per source, migration settings, and whether the
//! legacy table state has already been copied in. The wire shape is
//!
//! ```json
//! {
//!   "migrations": { "default": { "1610000000000": false } },
//!   "settings": { "migration_mode": "true" },
//!   "isStateCopyCompleted": true
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::records::{MigrationVersion, MigrationVersionRecord, SettingsRecord};
use crate::source::DataSource;

/// Applied versions of one source: version string to dirty flag.
pub type SourceMigrations = BTreeMap<String, bool>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogState {
    #[serde(default)]
    pub migrations: BTreeMap<String, SourceMigrations>,
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
    #[serde(default)]
    pub is_state_copy_completed: bool,
}

impl CatalogState {
    /// Returns the records held for `source`, in version order.
    ///
    /// Every integer key is returned, whatever its width. Keys that are not
    /// integers are skipped; the backend accepts arbitrary keys and older
    /// clients have written junk there. Use [`has_migrations_for`] to ask
    /// whether anything at all is recorded.
    ///
    /// [`has_migrations_for`]: CatalogState::has_migrations_for
    pub fn migration_records(&self, source: &DataSource) -> Vec<MigrationVersionRecord> {
        let Some(versions) = self.migrations.get(source.name()) else {
            return Vec::new();
        };
        let mut records: Vec<_> = versions
            .iter()
            .filter_map(|(version, dirty)| {
                let version = version.parse::<MigrationVersion>().ok()?;
                Some(MigrationVersionRecord {
                    source: source.clone(),
                    version,
                    dirty: *dirty,
                })
            })
            .collect();
        records.sort_by_key(|r| r.version);
        records
    }

    /// Returns true if `source` has any key, parsable or not.
    pub fn has_migrations_for(&self, source: &DataSource) -> bool {
        self.migrations
            .get(source.name())
            .is_some_and(|versions| !versions.is_empty())
    }

    pub fn insert_migration(&mut self, record: &MigrationVersionRecord) {
        self.migrations
            .entry(record.source.name().to_string())
            .or_default()
            .insert(record.version.to_string(), record.dirty);
    }

    /// Removes a version; returns whether it was present.
    pub fn remove_migration(&mut self, source: &DataSource, version: MigrationVersion) -> bool {
        let Some(versions) = self.migrations.get_mut(source.name()) else {
            return false;
        };
        let removed = versions.remove(&version.to_string()).is_some();
        if versions.is_empty() {
            self.migrations.remove(source.name());
        }
        removed
    }

    pub fn settings_records(&self) -> Vec<SettingsRecord> {
        self.settings
            .iter()
            .map(|(k, v)| SettingsRecord::new(k.clone(), v.clone()))
            .collect()
    }

    /// Total number of migration entries across all sources.
    pub fn migration_count(&self) -> usize {
        self.migrations.values().map(BTreeMap::len).sum()
    }
}
