//! Core data model for the stratum project upgrade tooling.
//!
//! Defines the project schema version, data source identity, the
//! bookkeeping records tracked per data source, and the backend-owned
//! catalog state blob. Everything here is plain data; persistence lives in
//! `stratum-storage` and the upgrade pipeline in `stratum-upgrade`.

pub mod catalog;
pub mod error;
pub mod records;
pub mod source;
pub mod version;

pub use catalog::CatalogState;
pub use error::CoreError;
pub use records::{is_migration_name, MigrationVersion, MigrationVersionRecord, SettingsRecord};
pub use source::{DataSource, DEFAULT_SOURCE};
pub use version::ProjectSchemaVersion;
