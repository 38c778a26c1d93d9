//! Re-export of server metadata into the local metadata directory.

use std::path::Path;

use serde_json::Value;
use tracing::{debug, info};

use crate::api::MetadataApi;
use crate::error::StepError;
use crate::fs::Filesystem;

/// File holding the metadata format version.
pub const VERSION_FILE_NAME: &str = "version.yaml";

/// Rendered metadata files, as `(file name, YAML contents)` in write order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataFiles {
    pub files: Vec<(String, String)>,
}

impl MetadataFiles {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|(name, _)| name.as_str())
    }
}

/// Renders an exported metadata document as files: `version.yaml` plus one
/// `<section>.yaml` per other top-level key.
pub fn metadata_files(metadata: &Value) -> Result<MetadataFiles, StepError> {
    let sections = metadata
        .as_object()
        .ok_or_else(|| StepError::Resync("exported metadata is not an object".to_string()))?;
    let to_yaml = |value: &Value| {
        serde_yaml::to_string(value).map_err(|e| StepError::Resync(e.to_string()))
    };

    let version = sections.get("version").cloned().unwrap_or(Value::from(1));
    let mut files = vec![(
        VERSION_FILE_NAME.to_string(),
        to_yaml(&serde_json::json!({ "version": version }))?,
    )];
    for (key, value) in sections {
        if key == "version" {
            continue;
        }
        files.push((section_file_name(key)?, to_yaml(value)?));
    }
    Ok(MetadataFiles { files })
}

/// Section keys come from the server; they must name a plain file inside
/// the metadata directory.
fn section_file_name(key: &str) -> Result<String, StepError> {
    if key.is_empty() || key.contains(['/', '\\']) || key.contains("..") {
        return Err(StepError::Resync(format!(
            "metadata section '{key}' is not a valid file name"
        )));
    }
    Ok(format!("{key}.yaml"))
}

/// Replaces the contents of `metadata_dir` with the server's metadata.
///
/// The export happens before anything local is touched, so a failing server
/// leaves the directory as it was.
pub fn resync_metadata<F, M>(fs: &F, api: &M, metadata_dir: &Path) -> Result<MetadataFiles, StepError>
where
    F: Filesystem + ?Sized,
    M: MetadataApi + ?Sized,
{
    let metadata = api
        .export_metadata()
        .map_err(|e| StepError::Resync(e.to_string()))?;
    let rendered = metadata_files(&metadata)?;

    let local = |e: std::io::Error| StepError::Resync(format!("{}: {e}", metadata_dir.display()));
    fs.remove_all(metadata_dir).map_err(local)?;
    fs.create_dir_all(metadata_dir).map_err(local)?;
    for (name, contents) in &rendered.files {
        debug!(file = %name, "writing metadata file");
        fs.write_file(&metadata_dir.join(name), contents.as_bytes())
            .map_err(local)?;
    }
    info!(files = rendered.files.len(), "metadata exported");
    Ok(rendered)
}
