//! Bookkeeping records tracked per data source.
//!
//! A migration batch lives in a directory named
//! `<13-digit-millis-timestamp>_<name>`; the timestamp is the version the
//! backend records once the batch is applied.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::source::DataSource;

static MIGRATION_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]{13})_(.*)$").expect("migration name pattern is a valid regex")
});

/// Returns true if `name` follows the `<13-digit-timestamp>_<name>`
/// convention of CLI-generated migrations.
pub fn is_migration_name(name: &str) -> bool {
    MIGRATION_NAME.is_match(name)
}

/// Version of an applied migration batch, usually its millisecond timestamp.
///
/// The legacy table holds any integer, so versions are not limited to the
/// 13 digits of CLI-generated names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MigrationVersion(pub u64);

impl FromStr for MigrationVersion {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CoreError::InvalidMigrationVersion {
                value: s.to_string(),
            });
        }
        s.parse()
            .map(MigrationVersion)
            .map_err(|_| CoreError::InvalidMigrationVersion {
                value: s.to_string(),
            })
    }
}

impl fmt::Display for MigrationVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One applied migration batch for a data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationVersionRecord {
    pub source: DataSource,
    pub version: MigrationVersion,
    /// Set when the batch failed halfway and needs manual repair.
    pub dirty: bool,
}

impl MigrationVersionRecord {
    /// Returns the same record re-associated with another source.
    pub fn renamed(&self, source: &DataSource) -> Self {
        MigrationVersionRecord {
            source: source.clone(),
            version: self.version,
            dirty: self.dirty,
        }
    }
}

/// A migration setting such as `migration_mode`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsRecord {
    pub key: String,
    pub value: String,
}

impl SettingsRecord {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        SettingsRecord {
            key: key.into(),
            value: value.into(),
        }
    }
}
