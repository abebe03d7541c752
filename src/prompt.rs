use crate::error::{OptiError, Result};
use inquire::{Confirm, InquireError, Select};
use std::fmt;

/// A prompt option: what the operator sees, and what the caller gets back.
#[derive(Debug, Clone)]
pub struct Choice<T> {
    pub label: String,
    pub value: T,
}

impl<T> fmt::Display for Choice<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

fn map_err(e: InquireError) -> OptiError {
    match e {
        InquireError::OperationCanceled | InquireError::OperationInterrupted => {
            OptiError::Cancelled("bye! 👋".to_string())
        }
        InquireError::NotTTY => OptiError::missing_input(
            "Cannot prompt for a choice without an interactive terminal",
            Some("Pass --yes (and the relevant flags) for non-interactive use"),
        ),
        other => OptiError::missing_input(format!("Prompt failed: {other}"), None),
    }
}

/// Single-select. A lone choice is returned without prompting.
pub fn select<T: Clone>(message: &str, mut choices: Vec<Choice<T>>) -> Result<T> {
    match choices.len() {
        0 => Err(OptiError::missing_input(format!("{message} (nothing to choose from)"), None)),
        1 => Ok(choices.remove(0).value),
        _ => Select::new(message, choices)
            .prompt()
            .map(|c| c.value)
            .map_err(map_err),
    }
}

pub fn confirm(message: &str, default: bool) -> Result<bool> {
    Confirm::new(message)
        .with_default(default)
        .prompt()
        .map_err(map_err)
}

/// `true` straight away when forced, otherwise ask.
pub fn confirm_or_forced(message: &str, forced: bool) -> Result<bool> {
    if forced {
        return Ok(true);
    }
    confirm(message, true)
}
