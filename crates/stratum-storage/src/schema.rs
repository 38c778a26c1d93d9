//! Conventional table layout of the legacy (config v2) state store.
//!
//! The backend keeps one row per applied migration version and one row per
//! migration setting. These tables belong to the backend; stratum only
//! reads them (and writes them when used as a plain store) but never
//! creates or drops them outside of tests and fixtures.

use rusqlite::{Connection, OpenFlags};

use crate::error::StorageError;

/// Applied migration versions.
pub const MIGRATIONS_TABLE: &str = "schema_migrations";

/// Migration settings.
pub const SETTINGS_TABLE: &str = "migration_settings";

/// DDL matching what the backend creates for [`MIGRATIONS_TABLE`].
pub const MIGRATIONS_TABLE_DDL: &str = "CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER NOT NULL PRIMARY KEY,
    dirty INTEGER NOT NULL
)";

/// DDL matching what the backend creates for [`SETTINGS_TABLE`].
pub const SETTINGS_TABLE_DDL: &str = "CREATE TABLE IF NOT EXISTS migration_settings (
    setting TEXT NOT NULL PRIMARY KEY,
    value TEXT NOT NULL
)";

/// Opens an existing state database at `path` without creating it.
pub fn open_database(path: &str) -> Result<Connection, StorageError> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| StorageError::unavailable("table", format!("cannot open '{}': {}", path, e)))?;
    Ok(conn)
}

/// Creates both legacy tables. Used to build fixtures.
pub fn create_legacy_tables(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(&format!("{};\n{};", MIGRATIONS_TABLE_DDL, SETTINGS_TABLE_DDL))
        .map_err(|e| StorageError::io("table", e))
}

/// Returns true if `table` exists in the connected database.
pub(crate) fn table_exists(conn: &Connection, table: &str) -> Result<bool, rusqlite::Error> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
        [table],
        |row| row.get(0),
    )
}
