//! Bookkeeping state stores for stratum projects.
//!
//! Provides the [`MigrationsStateStore`] and [`SettingsStateStore`] traits
//! that every backend implements, plus the two backends an upgrade moves
//! state between:
//!
//! - [`TableStore`]: the legacy layout, rows in the conventional
//!   `schema_migrations` / `migration_settings` tables (rusqlite).
//! - [`CatalogStore`]: the backend-owned catalog blob, reached through a
//!   [`CatalogStateApi`] with whole-state read-modify-write.
//!
//! # Modules
//!
//! - [`error`]: StorageError enum with all failure modes
//! - [`traits`]: store traits and the catalog endpoint trait
//! - [`schema`]: conventional table names and DDL
//! - [`table`]: TableStore implementation
//! - [`catalog`]: CatalogStore implementation
//! - [`memory`]: InMemoryCatalog endpoint
//! - [`copy`]: state transplant between stores

pub mod catalog;
pub mod copy;
pub mod error;
pub mod memory;
pub mod schema;
pub mod table;
pub mod traits;

// Re-export key types for ergonomic use.
pub use catalog::CatalogStore;
pub use copy::{
    copy_migration_state, copy_settings_state, copy_state, state_already_copied, CopyReport,
};
pub use error::StorageError;
pub use memory::InMemoryCatalog;
pub use table::TableStore;
pub use traits::{CatalogStateApi, MigrationsStateStore, SettingsStateStore, StateStore};
