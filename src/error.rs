//! Error kinds shared by every component. Nothing below `main` exits the
//! process; failures travel up as `OptiError` and get mapped to an exit code
//! and a one-line hint in a single place.

use std::path::Path;
use thiserror::Error;

pub type Result<T, E = OptiError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum OptiError {
    /// A required external tool is not installed or not reachable.
    #[error("Missing prerequisite: {tool}")]
    MissingPrerequisite { tool: String, hint: String },

    /// Something the operator has to provide is missing or malformed.
    #[error("{message}")]
    MissingInput { message: String, hint: Option<String> },

    #[error("Cannot find the project config at {path}")]
    ConfigNotFound { path: String },

    #[error("No free port found after {attempts} attempts starting at {start}")]
    PortExhausted { start: u16, attempts: u32 },

    #[error("No log line containing '{marker}' from {container} within {timeout_secs} seconds")]
    ReadinessTimeout {
        container: String,
        marker: String,
        timeout_secs: u64,
    },

    #[error("{program} failed: {detail}")]
    ExternalProcessFailure {
        program: String,
        detail: String,
        stderr: Vec<String>,
    },

    #[error("Could not {action} {path}: {detail}")]
    PersistenceFailure {
        action: &'static str,
        path: String,
        detail: String,
    },

    /// The operator interrupted a prompt or declined a required step.
    #[error("{0}")]
    Cancelled(String),
}

impl OptiError {
    pub fn missing_input(message: impl Into<String>, hint: Option<&str>) -> Self {
        OptiError::MissingInput {
            message: message.into(),
            hint: hint.map(str::to_string),
        }
    }

    pub fn persistence(action: &'static str, path: &Path, detail: impl ToString) -> Self {
        OptiError::PersistenceFailure {
            action,
            path: path.display().to_string(),
            detail: detail.to_string(),
        }
    }

    pub fn process(program: &str, detail: impl Into<String>, stderr: Vec<String>) -> Self {
        OptiError::ExternalProcessFailure {
            program: program.to_string(),
            detail: detail.into(),
            stderr,
        }
    }

    /// One-line remediation hint printed under the error, if any.
    pub fn hint(&self) -> Option<String> {
        match self {
            OptiError::MissingPrerequisite { hint, .. } => Some(hint.clone()),
            OptiError::MissingInput { hint, .. } => hint.clone(),
            OptiError::ConfigNotFound { .. } => {
                Some("Have you run the setup using <opti db> in the root of the project?".to_string())
            }
            OptiError::PortExhausted { .. } => Some("Pass a port explicitly with --port".to_string()),
            OptiError::ReadinessTimeout { .. } => Some(
                "The container may still be starting; check <docker logs> or retry with <opti db up>"
                    .to_string(),
            ),
            OptiError::ExternalProcessFailure { .. }
            | OptiError::PersistenceFailure { .. }
            | OptiError::Cancelled(_) => None,
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            OptiError::Cancelled(_) => 0,
            _ => 1,
        }
    }
}
