use crate::config::{self, STATE_DIR};
use crate::context::Context;
use crate::error::{OptiError, Result};
use crate::prereq;
use crate::project;
use std::fs;

/// What `init` changed. Empty when the project was already set up.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct InitReport {
    pub created_state_dir: bool,
    pub created_bacpac_dir: bool,
    pub created_config: bool,
    pub updated_gitignore: bool,
}

/// Create `.opti/`, `.opti/bacpac/` and a placeholder project record, and
/// keep `.opti` out of git. Safe to run repeatedly.
pub fn init(ctx: &Context) -> Result<InitReport> {
    let printer = ctx.printer.scoped("init");
    let mut report = InitReport::default();

    let state = config::state_dir(&ctx.root);
    if !state.is_dir() {
        fs::create_dir_all(&state).map_err(|e| OptiError::persistence("create", &state, e))?;
        report.created_state_dir = true;
        printer.info(&format!("Created {STATE_DIR} directory in app root"));
    }

    let bacpac = state.join("bacpac");
    if !bacpac.is_dir() {
        fs::create_dir_all(&bacpac).map_err(|e| OptiError::persistence("create", &bacpac, e))?;
        report.created_bacpac_dir = true;
        printer.info("Created bacpac directory");
    }

    let cfg = project::config_path(&ctx.root);
    if !cfg.exists() {
        fs::write(&cfg, "{}").map_err(|e| OptiError::persistence("write", &cfg, e))?;
        report.created_config = true;
        printer.info(&format!("Created {} config file", project::FILE_NAME));
    }

    let gitignore = ctx.root.join(".gitignore");
    if !gitignore.exists() {
        printer.neutral("Missing .gitignore file in project, skipping updating gitignore.");
    } else if prereq::append_line_once(&gitignore, STATE_DIR)? {
        report.updated_gitignore = true;
        printer.info(&format!("Updated .gitignore to exclude {STATE_DIR}"));
    }

    if report == InitReport::default() {
        printer.neutral("Already initialized");
    }
    Ok(report)
}
