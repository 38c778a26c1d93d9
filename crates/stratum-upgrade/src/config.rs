//! Project `config.yaml` model and the version rewrite.
//!
//! Only the keys the upgrade reads are modeled; every other key is carried
//! through untouched so rewriting the version never drops operator
//! settings.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use stratum_core::ProjectSchemaVersion;

use crate::error::StepError;
use crate::fs::Filesystem;

/// File name of the project config inside the project root.
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Errors reading or writing `config.yaml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

fn default_version() -> ProjectSchemaVersion {
    ProjectSchemaVersion::V1
}

fn default_metadata_directory() -> String {
    "metadata".to_string()
}

fn default_migrations_directory() -> String {
    "migrations".to_string()
}

fn default_seeds_directory() -> String {
    "seeds".to_string()
}

/// Parsed `config.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Missing in the oldest projects, which are v1.
    #[serde(default = "default_version")]
    pub version: ProjectSchemaVersion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_secret: Option<String>,
    #[serde(default = "default_metadata_directory")]
    pub metadata_directory: String,
    #[serde(default = "default_migrations_directory")]
    pub migrations_directory: String,
    #[serde(default = "default_seeds_directory")]
    pub seeds_directory: String,
    /// Keys not modeled above, preserved verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl ProjectConfig {
    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(contents)?)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Reads and parses the config at `path`.
    pub fn load<F: Filesystem + ?Sized>(fs: &F, path: &Path) -> Result<Self, ConfigError> {
        let bytes = fs.read_file(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let contents = String::from_utf8_lossy(&bytes);
        Self::from_yaml(&contents)
    }
}

/// Durable sink for the project config.
pub trait ConfigWriter {
    fn write_config(&self, config: &ProjectConfig) -> Result<(), ConfigError>;
}

/// Writes the config as YAML through a [`Filesystem`].
pub struct FsConfigWriter<'a, F: ?Sized> {
    fs: &'a F,
    path: PathBuf,
}

impl<'a, F: Filesystem + ?Sized> FsConfigWriter<'a, F> {
    pub fn new(fs: &'a F, path: impl Into<PathBuf>) -> Self {
        FsConfigWriter {
            fs,
            path: path.into(),
        }
    }
}

impl<F: Filesystem + ?Sized> ConfigWriter for FsConfigWriter<'_, F> {
    fn write_config(&self, config: &ProjectConfig) -> Result<(), ConfigError> {
        let yaml = config.to_yaml()?;
        self.fs
            .write_file(&self.path, yaml.as_bytes())
            .map_err(|source| ConfigError::Io {
                path: self.path.clone(),
                source,
            })
    }
}

/// Persists `config` with its version set to `target`.
///
/// The in-memory config is only updated once the write succeeded, so a
/// failure leaves both copies at the old version.
pub fn rewrite_version<W: ConfigWriter + ?Sized>(
    config: &mut ProjectConfig,
    target: ProjectSchemaVersion,
    writer: &W,
) -> Result<(), StepError> {
    let mut updated = config.clone();
    updated.version = target;
    writer
        .write_config(&updated)
        .map_err(StepError::ConfigPersist)?;
    debug!(version = %target, "wrote config");
    *config = updated;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemFs;

    const V2_CONFIG: &str = "version: 2
endpoint: http://localhost:8080
admin_secret: secret
metadata_directory: metadata
actions:
  kind: synchronous
  handler_webhook_baseurl: http://localhost:3000
";

    struct FailingWriter;

    impl ConfigWriter for FailingWriter {
        fn write_config(&self, _config: &ProjectConfig) -> Result<(), ConfigError> {
            Err(ConfigError::Io {
                path: PathBuf::from("config.yaml"),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "read-only"),
            })
        }
    }

    #[test]
    fn parses_known_keys_and_defaults() {
        let config = ProjectConfig::from_yaml(V2_CONFIG).unwrap();
        assert_eq!(config.version, ProjectSchemaVersion::V2);
        assert_eq!(config.endpoint.as_deref(), Some("http://localhost:8080"));
        assert_eq!(config.migrations_directory, "migrations");
        assert_eq!(config.seeds_directory, "seeds");
        assert!(config.extra.contains_key("actions"));
    }

    #[test]
    fn missing_version_means_v1() {
        let config = ProjectConfig::from_yaml("endpoint: http://localhost:8080\n").unwrap();
        assert_eq!(config.version, ProjectSchemaVersion::V1);
    }

    #[test]
    fn rewrite_preserves_unknown_keys() {
        let fs = MemFs::new();
        fs.add_file("/p/config.yaml", V2_CONFIG).unwrap();
        let path = Path::new("/p/config.yaml");
        let mut config = ProjectConfig::load(&fs, path).unwrap();

        rewrite_version(&mut config, ProjectSchemaVersion::V3, &FsConfigWriter::new(&fs, path))
            .unwrap();
        assert_eq!(config.version, ProjectSchemaVersion::V3);

        let reloaded = ProjectConfig::load(&fs, path).unwrap();
        assert_eq!(reloaded, config);
        assert_eq!(
            reloaded.extra["actions"]["kind"],
            serde_yaml::Value::String("synchronous".into())
        );
    }

    #[test]
    fn failed_write_leaves_in_memory_version() {
        let mut config = ProjectConfig::from_yaml(V2_CONFIG).unwrap();
        let err = rewrite_version(&mut config, ProjectSchemaVersion::V3, &FailingWriter).unwrap_err();
        assert!(matches!(err, StepError::ConfigPersist(_)));
        assert_eq!(config.version, ProjectSchemaVersion::V2);
    }

    #[test]
    fn rejects_unknown_version() {
        assert!(ProjectConfig::from_yaml("version: 9\n").is_err());
    }
}
