//! Table-backed implementation of the state store traits.
//!
//! [`TableStore`] reads and writes the legacy `schema_migrations` and
//! `migration_settings` tables. The legacy layout predates multiple data
//! sources, so rows carry no source column: every row belongs to whichever
//! source the store was prepared for.

use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use stratum_core::{DataSource, MigrationVersion, MigrationVersionRecord, SettingsRecord};

use crate::error::StorageError;
use crate::schema::{self, MIGRATIONS_TABLE, SETTINGS_TABLE};
use crate::traits::{MigrationsStateStore, SettingsStateStore};

const STORE: &str = "table";

/// SQLite-backed legacy state store.
pub struct TableStore {
    conn: Connection,
}

impl TableStore {
    /// Opens an existing state database at `path`.
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let conn = schema::open_database(path)?;
        Ok(TableStore { conn })
    }

    /// Wraps an already-open connection.
    pub fn from_connection(conn: Connection) -> Self {
        TableStore { conn }
    }

    /// Opens an in-memory database with both legacy tables created (for
    /// testing).
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(|e| StorageError::unavailable(STORE, e))?;
        schema::create_legacy_tables(&conn)?;
        Ok(TableStore { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Verifies `table` exists and a row can be read from it.
    fn check_readable(&self, table: &str) -> Result<(), StorageError> {
        let exists = schema::table_exists(&self.conn, table)
            .map_err(|e| StorageError::unavailable(STORE, e))?;
        if !exists {
            return Err(StorageError::unavailable(
                STORE,
                format!("table '{}' does not exist", table),
            ));
        }
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT * FROM {} LIMIT 1", table))
            .map_err(|e| StorageError::unavailable(STORE, e))?;
        stmt.exists([])
            .map_err(|e| StorageError::unavailable(STORE, e))?;
        Ok(())
    }
}

impl MigrationsStateStore for TableStore {
    fn prepare_migrations_state_store(&mut self, source: &DataSource) -> Result<(), StorageError> {
        debug!(source = %source, table = MIGRATIONS_TABLE, "preparing table migrations store");
        self.check_readable(MIGRATIONS_TABLE)
    }

    fn get_versions(&self, source: &DataSource) -> Result<Vec<MigrationVersionRecord>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT version, dirty FROM schema_migrations ORDER BY version")
            .map_err(|e| StorageError::io(STORE, e))?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, bool>(1)?)))
            .map_err(|e| StorageError::io(STORE, e))?;

        let mut out = Vec::new();
        for row in rows {
            let (version, dirty) = row.map_err(|e| StorageError::io(STORE, e))?;
            let version = u64::try_from(version)
                .map_err(|_| StorageError::io(STORE, format!("negative version {}", version)))?;
            out.push(MigrationVersionRecord {
                source: source.clone(),
                version: MigrationVersion(version),
                dirty,
            });
        }
        Ok(out)
    }

    fn set_version(
        &mut self,
        _source: &DataSource,
        version: MigrationVersion,
        dirty: bool,
    ) -> Result<(), StorageError> {
        let version = version_param(version)?;
        self.conn
            .execute(
                "INSERT INTO schema_migrations (version, dirty) VALUES (?1, ?2)
                 ON CONFLICT(version) DO UPDATE SET dirty = excluded.dirty",
                params![version, dirty],
            )
            .map_err(|e| StorageError::io(STORE, e))?;
        Ok(())
    }

    fn set_versions(
        &mut self,
        _source: &DataSource,
        records: &[MigrationVersionRecord],
    ) -> Result<(), StorageError> {
        let tx = self
            .conn
            .transaction()
            .map_err(|e| StorageError::io(STORE, e))?;
        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT INTO schema_migrations (version, dirty) VALUES (?1, ?2)
                     ON CONFLICT(version) DO UPDATE SET dirty = excluded.dirty",
                )
                .map_err(|e| StorageError::io(STORE, e))?;
            for record in records {
                stmt.execute(params![version_param(record.version)?, record.dirty])
                    .map_err(|e| StorageError::io(STORE, e))?;
            }
        }
        tx.commit().map_err(|e| StorageError::io(STORE, e))
    }

    fn remove_version(
        &mut self,
        _source: &DataSource,
        version: MigrationVersion,
    ) -> Result<(), StorageError> {
        self.conn
            .execute(
                "DELETE FROM schema_migrations WHERE version = ?1",
                params![version_param(version)?],
            )
            .map_err(|e| StorageError::io(STORE, e))?;
        Ok(())
    }
}

impl SettingsStateStore for TableStore {
    fn prepare_settings_driver(&mut self) -> Result<(), StorageError> {
        debug!(table = SETTINGS_TABLE, "preparing table settings store");
        self.check_readable(SETTINGS_TABLE)
    }

    fn get_settings(&self) -> Result<Vec<SettingsRecord>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT setting, value FROM migration_settings ORDER BY setting")
            .map_err(|e| StorageError::io(STORE, e))?;
        let rows = stmt
            .query_map([], |row| Ok(SettingsRecord::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .map_err(|e| StorageError::io(STORE, e))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| StorageError::io(STORE, e))
    }

    fn get_setting(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.conn
            .query_row(
                "SELECT value FROM migration_settings WHERE setting = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StorageError::io(STORE, e))
    }

    fn set_setting(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.conn
            .execute(
                "INSERT INTO migration_settings (setting, value) VALUES (?1, ?2)
                 ON CONFLICT(setting) DO UPDATE SET value = excluded.value",
                params![key, value],
            )
            .map_err(|e| StorageError::io(STORE, e))?;
        Ok(())
    }
}

fn version_param(version: MigrationVersion) -> Result<i64, StorageError> {
    i64::try_from(version.0)
        .map_err(|_| StorageError::io(STORE, format!("version {} out of range", version)))
}
