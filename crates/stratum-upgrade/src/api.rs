//! Metadata API collaborator.
//!
//! [`MetadataApi`] is the slice of the backend's metadata API the upgrade
//! needs. The HTTP implementation lives in the binary crate;
//! [`InMemoryMetadata`] serves tests and dry runs.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use stratum_core::DataSource;

/// Errors talking to the backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never got a response.
    #[error("request to {endpoint} failed: {reason}")]
    Transport { endpoint: String, reason: String },

    /// The server answered with a non-success status.
    #[error("server responded with status {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body did not have the expected shape.
    #[error("unexpected response from server: {0}")]
    Decode(String),
}

/// Result of the server's inconsistency check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InconsistencyReport {
    pub is_consistent: bool,
    #[serde(default)]
    pub inconsistent_objects: Vec<Value>,
}

/// Connection details for registering a data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: DataSource,
    /// Backend kind, e.g. `postgres`.
    pub kind: String,
    pub database_url: String,
}

/// Backend metadata operations used by the upgrade.
pub trait MetadataApi {
    /// Exports the server's full metadata document.
    fn export_metadata(&self) -> Result<Value, ApiError>;

    /// Asks the server whether its metadata is consistent.
    fn get_inconsistent_metadata(&self) -> Result<InconsistencyReport, ApiError>;

    /// Registers a new data source.
    fn add_source(&self, config: &SourceConfig) -> Result<(), ApiError>;

    /// Whether the server speaks metadata v3 (multiple sources).
    fn supports_metadata_v3(&self) -> Result<bool, ApiError>;
}

/// Extracts the connected source names from an exported metadata document.
pub fn list_sources(metadata: &Value) -> Result<Vec<DataSource>, ApiError> {
    let Some(sources) = metadata.get("sources") else {
        return Ok(Vec::new());
    };
    let sources = sources
        .as_array()
        .ok_or_else(|| ApiError::Decode("metadata 'sources' is not an array".to_string()))?;
    sources
        .iter()
        .map(|source| {
            let name = source
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| ApiError::Decode("metadata source without a name".to_string()))?;
            DataSource::new(name).map_err(|e| ApiError::Decode(e.to_string()))
        })
        .collect()
}

#[derive(Debug)]
struct Inner {
    metadata: Value,
    consistent: bool,
    metadata_v3: bool,
    fail_exports: bool,
    exports: usize,
}

/// In-memory metadata backend.
///
/// Holds a metadata document whose `sources` grow through
/// [`MetadataApi::add_source`]. Switches allow simulating an inconsistent
/// server, an old server, or a failing export.
#[derive(Debug)]
pub struct InMemoryMetadata {
    inner: Mutex<Inner>,
}

impl InMemoryMetadata {
    /// A v3-capable, consistent server with no sources.
    pub fn new() -> Self {
        Self::with_metadata(json!({ "version": 3, "sources": [] }))
    }

    pub fn with_metadata(metadata: Value) -> Self {
        InMemoryMetadata {
            inner: Mutex::new(Inner {
                metadata,
                consistent: true,
                metadata_v3: true,
                fail_exports: false,
                exports: 0,
            }),
        }
    }

    pub fn set_consistent(&self, consistent: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.consistent = consistent;
        }
    }

    pub fn set_metadata_v3(&self, supported: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.metadata_v3 = supported;
        }
    }

    pub fn set_fail_exports(&self, fail: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.fail_exports = fail;
        }
    }

    /// Number of successful exports served.
    pub fn export_count(&self) -> usize {
        self.inner.lock().map(|inner| inner.exports).unwrap_or(0)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, ApiError> {
        self.inner.lock().map_err(|_| ApiError::Transport {
            endpoint: "memory".to_string(),
            reason: "metadata mutex poisoned".to_string(),
        })
    }
}

impl Default for InMemoryMetadata {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataApi for InMemoryMetadata {
    fn export_metadata(&self) -> Result<Value, ApiError> {
        let mut inner = self.lock()?;
        if inner.fail_exports {
            return Err(ApiError::Status {
                status: 500,
                body: "export_metadata failed".to_string(),
            });
        }
        inner.exports += 1;
        Ok(inner.metadata.clone())
    }

    fn get_inconsistent_metadata(&self) -> Result<InconsistencyReport, ApiError> {
        let inner = self.lock()?;
        Ok(InconsistencyReport {
            is_consistent: inner.consistent,
            inconsistent_objects: Vec::new(),
        })
    }

    fn add_source(&self, config: &SourceConfig) -> Result<(), ApiError> {
        let mut inner = self.lock()?;
        let entry = json!({
            "name": config.name.name(),
            "kind": config.kind,
            "tables": [],
            "configuration": {
                "connection_info": { "database_url": config.database_url }
            }
        });
        let metadata = inner
            .metadata
            .as_object_mut()
            .ok_or_else(|| ApiError::Decode("metadata is not an object".to_string()))?;
        let sources = metadata
            .entry("sources")
            .or_insert_with(|| Value::Array(Vec::new()))
            .as_array_mut()
            .ok_or_else(|| ApiError::Decode("metadata 'sources' is not an array".to_string()))?;
        if sources
            .iter()
            .any(|s| s.get("name").and_then(Value::as_str) == Some(config.name.name()))
        {
            return Err(ApiError::Status {
                status: 400,
                body: format!("source with name \"{}\" already exists", config.name),
            });
        }
        sources.push(entry);
        Ok(())
    }

    fn supports_metadata_v3(&self) -> Result<bool, ApiError> {
        Ok(self.lock()?.metadata_v3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(name: &str) -> SourceConfig {
        SourceConfig {
            name: DataSource::new(name).unwrap(),
            kind: "postgres".to_string(),
            database_url: format!("postgres://localhost/{name}"),
        }
    }

    #[test]
    fn added_sources_show_up_in_export() {
        let api = InMemoryMetadata::new();
        api.add_source(&source("default")).unwrap();
        api.add_source(&source("analytics")).unwrap();
        let sources = list_sources(&api.export_metadata().unwrap()).unwrap();
        let names: Vec<_> = sources.iter().map(DataSource::name).collect();
        assert_eq!(names, vec!["default", "analytics"]);
        assert_eq!(api.export_count(), 1);
    }

    #[test]
    fn duplicate_source_is_rejected() {
        let api = InMemoryMetadata::new();
        api.add_source(&source("default")).unwrap();
        assert!(matches!(
            api.add_source(&source("default")),
            Err(ApiError::Status { status: 400, .. })
        ));
    }

    #[test]
    fn metadata_without_sources_lists_none() {
        assert!(list_sources(&json!({ "version": 2, "tables": [] }))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn malformed_sources_are_decode_errors() {
        assert!(matches!(
            list_sources(&json!({ "sources": {} })),
            Err(ApiError::Decode(_))
        ));
        assert!(matches!(
            list_sources(&json!({ "sources": [{ "kind": "postgres" }] })),
            Err(ApiError::Decode(_))
        ));
    }

    #[test]
    fn failing_export_reports_status() {
        let api = InMemoryMetadata::new();
        api.set_fail_exports(true);
        assert!(matches!(
            api.export_metadata(),
            Err(ApiError::Status { status: 500, .. })
        ));
        assert_eq!(api.export_count(), 0);
    }
}
