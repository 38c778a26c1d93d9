//! Data source identity.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Name the backend gives its implicit single data source.
pub const DEFAULT_SOURCE: &str = "default";

/// A named database connection registered with the backend.
///
/// The name doubles as a directory name in the V3 layout, so it must be a
/// single, non-empty path component.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DataSource(String);

impl DataSource {
    pub fn new(name: impl Into<String>) -> Result<Self, CoreError> {
        let name = name.into();
        let reason = if name.is_empty() {
            Some("name is empty")
        } else if name == "." || name == ".." {
            Some("name is a relative path component")
        } else if name.contains(['/', '\\']) {
            Some("name contains a path separator")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(CoreError::InvalidSourceName { name, reason }),
            None => Ok(DataSource(name)),
        }
    }

    /// The implicit `default` source.
    pub fn default_source() -> Self {
        DataSource(DEFAULT_SOURCE.to_string())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn is_default(&self) -> bool {
        self.0 == DEFAULT_SOURCE
    }
}

impl TryFrom<String> for DataSource {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        DataSource::new(value)
    }
}

impl From<DataSource> for String {
    fn from(source: DataSource) -> Self {
        source.0
    }
}

impl AsRef<str> for DataSource {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_source_is_default() {
        let source = DataSource::default_source();
        assert!(source.is_default());
        assert_eq!(source.name(), "default");
        assert!(!DataSource::new("analytics").unwrap().is_default());
    }

    #[test]
    fn rejects_names_that_escape_the_directory() {
        for bad in ["", ".", "..", "a/b", "a\\b"] {
            assert!(
                matches!(DataSource::new(bad), Err(CoreError::InvalidSourceName { .. })),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn deserializes_through_validation() {
        let ok: DataSource = serde_json::from_str("\"pg2\"").unwrap();
        assert_eq!(ok.name(), "pg2");
        assert!(serde_json::from_str::<DataSource>("\"../x\"").is_err());
    }
}
