//! Blocking HTTP client for the backend's metadata API.
//!
//! Every metadata operation is a `POST /v1/metadata` with a
//! `{"type": ..., "args": ...}` body; the server version comes from
//! `GET /v1/version`.

use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use stratum_core::CatalogState;
use stratum_storage::{CatalogStateApi, StorageError};
use stratum_upgrade::{ApiError, InconsistencyReport, MetadataApi, SourceConfig};

const ADMIN_SECRET_HEADER: &str = "X-Admin-Secret";

/// Catalog state type owned by this tool.
const CATALOG_STATE_TYPE: &str = "cli";

/// Backend client over HTTP.
pub struct HttpClient {
    http: Client,
    endpoint: String,
    admin_secret: Option<String>,
}

impl HttpClient {
    pub fn new(endpoint: &str, admin_secret: Option<String>) -> Self {
        HttpClient {
            http: Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            admin_secret,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint, path)
    }

    fn send(&self, request: reqwest::blocking::RequestBuilder, url: &str) -> Result<Value, ApiError> {
        let request = match &self.admin_secret {
            Some(secret) => request.header(ADMIN_SECRET_HEADER, secret),
            None => request,
        };
        let response = request.send().map_err(|err| ApiError::Transport {
            endpoint: url.to_string(),
            reason: err.to_string(),
        })?;
        let status = response.status();
        let body = response.text().map_err(|err| ApiError::Transport {
            endpoint: url.to_string(),
            reason: format!("reading response failed: {}", err),
        })?;
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        serde_json::from_str(&body).map_err(|err| ApiError::Decode(err.to_string()))
    }

    /// Posts a metadata API query.
    fn query(&self, kind: &str, args: Value) -> Result<Value, ApiError> {
        let url = self.url("v1/metadata");
        debug!(query = kind, "metadata request");
        let body = json!({ "type": kind, "args": args });
        self.send(self.http.post(&url).json(&body), &url)
    }

    fn server_version(&self) -> Result<String, ApiError> {
        let url = self.url("v1/version");
        let body = self.send(self.http.get(&url), &url)?;
        let version: VersionResponse =
            serde_json::from_value(body).map_err(|err| ApiError::Decode(err.to_string()))?;
        Ok(version.version)
    }

    fn catalog_state(&self) -> Result<CatalogState, ApiError> {
        let response = self.query("get_catalog_state", json!({}))?;
        parse_catalog_state(response)
    }
}

#[derive(Debug, Deserialize)]
struct VersionResponse {
    version: String,
}

/// Whether a server version string is new enough for multiple sources.
///
/// Development builds report versions that do not parse; they are assumed
/// to be current.
pub fn version_supports_metadata_v3(version: &str) -> bool {
    let trimmed = version.trim_start_matches('v');
    let major = trimmed
        .split(|c: char| !c.is_ascii_digit())
        .next()
        .and_then(|major| major.parse::<u32>().ok());
    match major {
        Some(major) => major >= 2,
        None => true,
    }
}

/// Extracts this tool's state from a `get_catalog_state` response.
pub fn parse_catalog_state(response: Value) -> Result<CatalogState, ApiError> {
    match response.get("cli_state") {
        None | Some(Value::Null) => Ok(CatalogState::default()),
        Some(state) => serde_json::from_value(state.clone())
            .map_err(|err| ApiError::Decode(format!("catalog state: {}", err))),
    }
}

impl MetadataApi for HttpClient {
    fn export_metadata(&self) -> Result<Value, ApiError> {
        self.query("export_metadata", json!({}))
    }

    fn get_inconsistent_metadata(&self) -> Result<InconsistencyReport, ApiError> {
        let response = self.query("get_inconsistent_metadata", json!({}))?;
        serde_json::from_value(response).map_err(|err| ApiError::Decode(err.to_string()))
    }

    fn add_source(&self, config: &SourceConfig) -> Result<(), ApiError> {
        let kind = format!("{}_add_source", config.kind);
        let args = json!({
            "name": config.name.name(),
            "configuration": {
                "connection_info": { "database_url": config.database_url }
            }
        });
        self.query(&kind, args).map(|_| ())
    }

    fn supports_metadata_v3(&self) -> Result<bool, ApiError> {
        let version = self.server_version()?;
        debug!(%version, "server version");
        Ok(version_supports_metadata_v3(&version))
    }
}

impl CatalogStateApi for HttpClient {
    fn get(&self) -> Result<CatalogState, StorageError> {
        self.catalog_state().map_err(catalog_error)
    }

    fn set(&self, state: &CatalogState) -> Result<(), StorageError> {
        let state = serde_json::to_value(state)?;
        let args = json!({ "type": CATALOG_STATE_TYPE, "state": state });
        self.query("set_catalog_state", args)
            .map(|_| ())
            .map_err(catalog_error)
    }
}

fn catalog_error(err: ApiError) -> StorageError {
    StorageError::Io {
        store: "catalog",
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_core::DataSource;

    #[test]
    fn version_gate() {
        assert!(version_supports_metadata_v3("v2.0.0"));
        assert!(version_supports_metadata_v3("v2.0.0-alpha.1"));
        assert!(version_supports_metadata_v3("12.3"));
        assert!(!version_supports_metadata_v3("v1.3.3"));
        assert!(version_supports_metadata_v3("dev-build-a1b2c3"));
    }

    #[test]
    fn catalog_state_from_response() {
        let response = json!({
            "id": "cli",
            "cli_state": {
                "migrations": { "default": { "1600000000000": false } },
                "settings": { "migration_mode": "true" },
                "isStateCopyCompleted": true
            },
            "console_state": {}
        });
        let state = parse_catalog_state(response).unwrap();
        assert!(state.is_state_copy_completed);
        assert!(state.has_migrations_for(&DataSource::default_source()));
        assert_eq!(state.settings["migration_mode"], "true");
    }

    #[test]
    fn missing_cli_state_is_empty() {
        assert_eq!(
            parse_catalog_state(json!({ "cli_state": null })).unwrap(),
            CatalogState::default()
        );
        assert_eq!(parse_catalog_state(json!({})).unwrap(), CatalogState::default());
    }

    #[test]
    fn malformed_cli_state_is_a_decode_error() {
        assert!(matches!(
            parse_catalog_state(json!({ "cli_state": { "migrations": [] } })),
            Err(ApiError::Decode(_))
        ));
    }

    #[test]
    fn unreachable_server_is_a_transport_error() {
        let client = HttpClient::new("http://127.0.0.1:1/", None);
        assert_eq!(client.url("v1/metadata"), "http://127.0.0.1:1/v1/metadata");
        assert!(matches!(
            client.export_metadata(),
            Err(ApiError::Transport { .. })
        ));
    }
}
