//! ASP.NET `appsettings*.json` discovery and the single-field connection
//! string rewrite.

use crate::error::{OptiError, Result};
use crate::files::{self, Match};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEVELOPMENT_FILE: &str = "appsettings.Development.json";
pub const BASE_FILE: &str = "appsettings.json";
const SECTION: &str = "ConnectionStrings";

/// Development settings files under `root`, falling back to the base
/// `appsettings.json` when there are none.
pub fn discover(root: &Path) -> Vec<PathBuf> {
    let dev = files::search(root, Match::Name(DEVELOPMENT_FILE));
    if !dev.is_empty() {
        return dev;
    }
    files::search(root, Match::Name(BASE_FILE))
}

/// Replace `ConnectionStrings.<key>` in an already-parsed document. Every
/// other key keeps its value and position.
pub fn set_connection_string(doc: &mut Value, key: &str, connection_string: &str) -> Result<(), String> {
    let root = doc
        .as_object_mut()
        .ok_or_else(|| "top-level value is not a JSON object".to_string())?;

    let section = root
        .entry(SECTION)
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| format!("'{SECTION}' is not a JSON object"))?;

    section.insert(key.to_string(), Value::String(connection_string.to_string()));
    Ok(())
}

const BOM: char = '\u{feff}';

/// Rewrite the settings file at `path` with the new connection string,
/// 2-space indented. A leading byte order mark and a trailing newline are
/// kept. Nothing is written if the file cannot be parsed.
pub fn update_file(path: &Path, key: &str, connection_string: &str) -> Result<()> {
    let raw = fs::read_to_string(path).map_err(|e| OptiError::persistence("read", path, e))?;
    let text = raw.strip_prefix(BOM).unwrap_or(&raw);
    let mut doc: Value = serde_json::from_str(text).map_err(|e| OptiError::persistence("parse", path, e))?;

    set_connection_string(&mut doc, key, connection_string)
        .map_err(|detail| OptiError::persistence("update", path, detail))?;

    let pretty = serde_json::to_string_pretty(&doc).map_err(|e| OptiError::persistence("serialize", path, e))?;
    let mut body = String::with_capacity(pretty.len() + 4);
    if raw.starts_with(BOM) {
        body.push(BOM);
    }
    body.push_str(&pretty);
    if raw.ends_with('\n') {
        body.push('\n');
    }
    files::write_atomic(path, &body)
}
