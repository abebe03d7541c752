//! Per-project record stored at `.opti/project.json`.

use crate::config;
use crate::connection;
use crate::error::{OptiError, Result};
use crate::files;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const SCHEMA_VERSION: u32 = 1;
pub const FILE_NAME: &str = "project.json";

fn schema_v1() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(rename = "SCHEMA_VERSION", default = "schema_v1")]
    pub schema_version: u32,
    #[serde(rename = "BACPAC_PATH", alias = "BACPAC_FILENAME")]
    pub snapshot_path: String,
    #[serde(rename = "DB_NAME")]
    pub database_name: String,
    #[serde(rename = "SQLEDGE_CONTAINER_NAME", alias = "APP_NAME")]
    pub container_name: String,
    #[serde(rename = "PORT")]
    pub port: String,
    #[serde(rename = "CONNECTION_STRING")]
    pub connection_string: String,
}

impl ProjectConfig {
    /// Derive the database name and connection string from the other fields.
    pub fn new(snapshot_path: &str, container_name: &str, port: &str) -> Self {
        let database_name = connection::database_name(snapshot_path);
        let connection_string = connection::assemble(port, container_name, &database_name);
        ProjectConfig {
            schema_version: SCHEMA_VERSION,
            snapshot_path: snapshot_path.to_string(),
            database_name,
            container_name: container_name.to_string(),
            port: port.to_string(),
            connection_string,
        }
    }
}

pub fn config_path(root: &Path) -> PathBuf {
    config::state_dir(root).join(FILE_NAME)
}

pub fn read(root: &Path) -> Result<ProjectConfig> {
    let path = config_path(root);
    let not_found = || OptiError::ConfigNotFound {
        path: path.display().to_string(),
    };

    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
        Err(e) => return Err(OptiError::persistence("read", &path, e)),
    };

    // `opti init` leaves an empty placeholder behind.
    let value: serde_json::Value = match raw.trim() {
        "" => return Err(not_found()),
        text => serde_json::from_str(text).map_err(|e| OptiError::persistence("parse", &path, e))?,
    };
    if value.as_object().is_some_and(|o| o.is_empty()) {
        return Err(not_found());
    }

    let cfg: ProjectConfig =
        serde_json::from_value(value).map_err(|e| OptiError::persistence("parse", &path, e))?;
    if cfg.schema_version > SCHEMA_VERSION {
        return Err(OptiError::persistence(
            "read",
            &path,
            format!(
                "schema version {} is newer than this tool supports ({SCHEMA_VERSION})",
                cfg.schema_version
            ),
        ));
    }
    Ok(cfg)
}

/// Overwrite the whole record. Written to a sibling temp file first, so a
/// failed write leaves the previous record intact.
pub fn write(root: &Path, cfg: &ProjectConfig) -> Result<PathBuf> {
    let path = config_path(root);
    let dir = config::state_dir(root);
    fs::create_dir_all(&dir).map_err(|e| OptiError::persistence("create", &dir, e))?;

    let body = serde_json::to_string_pretty(cfg).map_err(|e| OptiError::persistence("serialize", &path, e))?;
    files::write_atomic(&path, &body)?;
    Ok(path)
}
