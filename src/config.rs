use std::path::{Path, PathBuf};

pub const DEFAULT_CONTAINER_PREFIX: &str = "sqledge";
pub const DEFAULT_IMAGE: &str = "mcr.microsoft.com/azure-sql-edge";
pub const DEFAULT_READY_MARKER: &str = "EdgeTelemetry starting up";
pub const DEFAULT_CONNECTION_STRING_KEY: &str = "EPiServerDB";
/// Port the database engine listens on inside the container.
pub const ENGINE_PORT: u16 = 1433;

/// Directory under the project root holding tool state.
pub const STATE_DIR: &str = ".opti";

/// Tool-level settings. Resolved once per invocation, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub docker_bin: String,
    pub sqlpackage_bin: String,
    pub dotnet_bin: String,
    pub brew_bin: String,

    pub container_prefix: String,
    pub image: String,
    pub ready_marker: String,
    pub ready_timeout_secs: u64,
    pub connection_string_key: String,
    pub default_port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Settings::from_lookup(|_| None)
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Settings::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup. Blank or unparsable values
    /// fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let text = |key: &str, default: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let ready_timeout_secs = lookup("OPTI_READY_TIMEOUT")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|s| *s > 0)
            .unwrap_or(30);

        let default_port = lookup("OPTI_DEFAULT_PORT")
            .and_then(|s| s.trim().parse::<u16>().ok())
            .filter(|p| *p > 0)
            .unwrap_or(ENGINE_PORT);

        Settings {
            docker_bin: text("DOCKER_BIN", "docker"),
            sqlpackage_bin: text("SQLPACKAGE_BIN", "sqlpackage"),
            dotnet_bin: text("DOTNET_BIN", "dotnet"),
            brew_bin: text("BREW_BIN", "brew"),
            container_prefix: text("OPTI_CONTAINER_PREFIX", DEFAULT_CONTAINER_PREFIX),
            image: text("OPTI_SQL_IMAGE", DEFAULT_IMAGE),
            ready_marker: text("OPTI_READY_MARKER", DEFAULT_READY_MARKER),
            ready_timeout_secs,
            connection_string_key: text("OPTI_CONNECTION_STRING_KEY", DEFAULT_CONNECTION_STRING_KEY),
            default_port,
        }
    }
}

pub fn state_dir(root: &Path) -> PathBuf {
    root.join(STATE_DIR)
}

/// Load `.opti/.env` into the process environment, if present. Variables
/// already set in the environment win.
pub fn load_env(root: &Path) -> Option<PathBuf> {
    let path = state_dir(root).join(".env");
    if !path.exists() {
        return None;
    }
    dotenvy::from_path(&path).ok().map(|_| path)
}
