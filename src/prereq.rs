//! Detection and installation of the external tools the database commands
//! depend on.

use crate::context::Context;
use crate::docker::Docker;
use crate::error::{OptiError, Result};
use crate::process;
use crate::prompt;
use std::fs;
use std::io::Write;
use std::path::Path;

pub const DOTNET_INSTALL_URL: &str = "https://learn.microsoft.com/en-us/dotnet/core/install/macos";
pub const BREW_INSTALL_URL: &str = "https://brew.sh";
pub const DOCKER_INSTALL_URL: &str = "https://docs.docker.com/get-docker/";

const SQLPACKAGE_TOOL: &str = "microsoft.sqlpackage";
const DOTNET_PATH_LINE: &str = r#"export PATH="/usr/local/share/dotnet:$PATH""#;
const DOTNET_TOOLS_PATH_LINE: &str = r#"export PATH="$PATH:$HOME/.dotnet/tools""#;

pub async fn check_dotnet(ctx: &Context) -> Result<()> {
    if process::command_exists(&ctx.settings.dotnet_bin).await {
        return Ok(());
    }
    Err(OptiError::MissingPrerequisite {
        tool: "dotnet".to_string(),
        hint: format!("Install the dotnet runtime before using this command: {DOTNET_INSTALL_URL}"),
    })
}

/// Offer to install sqlpackage when it is missing. Declining ends the
/// command without an error.
pub async fn check_sqlpackage(ctx: &Context) -> Result<()> {
    if process::command_exists(&ctx.settings.sqlpackage_bin).await {
        return Ok(());
    }
    ctx.printer.info("The sqlpackage cli is required to use this command");
    if !prompt::confirm("Install sqlpackage?", true)? {
        return Err(OptiError::Cancelled(
            "Can not continue without sqlpackage, exiting...".to_string(),
        ));
    }
    install_sqlpackage(ctx).await?;
    if process::command_exists(&ctx.settings.sqlpackage_bin).await {
        return Ok(());
    }
    Err(OptiError::MissingPrerequisite {
        tool: "sqlpackage".to_string(),
        hint: "sqlpackage was installed but is not on PATH yet; restart your shell and run the command again"
            .to_string(),
    })
}

pub async fn check_docker(ctx: &Context) -> Result<()> {
    if !process::command_exists(&ctx.settings.docker_bin).await {
        return Err(OptiError::MissingPrerequisite {
            tool: "docker".to_string(),
            hint: format!("Install Docker: {DOCKER_INSTALL_URL}"),
        });
    }
    if !Docker::new(ctx).available().await {
        return Err(OptiError::MissingPrerequisite {
            tool: "docker daemon".to_string(),
            hint: "Start Docker Desktop (or colima) and try again".to_string(),
        });
    }
    Ok(())
}

/// Everything `opti db` setup needs.
pub async fn check_database_tooling(ctx: &Context) -> Result<()> {
    check_dotnet(ctx).await?;
    check_sqlpackage(ctx).await?;
    check_docker(ctx).await
}

/// Append `line` to the file at `path` unless it already contains it.
/// Returns whether the file changed.
pub fn append_line_once(path: &Path, line: &str) -> Result<bool> {
    let existing = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(OptiError::persistence("read", path, e)),
    };
    if existing.lines().any(|l| l.trim() == line) {
        return Ok(false);
    }

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| OptiError::persistence("open", path, e))?;
    let sep = if existing.is_empty() || existing.ends_with('\n') { "" } else { "\n" };
    writeln!(file, "{sep}{line}").map_err(|e| OptiError::persistence("write", path, e))?;
    Ok(true)
}

fn add_to_shell_profile(ctx: &Context, file_name: &str, line: &str) -> Result<()> {
    let Some(home) = dirs::home_dir() else {
        ctx.printer.warn(&format!("No home directory found; add this to your shell profile: {line}"));
        return Ok(());
    };
    let profile = home.join(file_name);
    if append_line_once(&profile, line)? {
        ctx.printer.path("Added to", &profile.display().to_string());
    } else {
        ctx.printer.neutral(&format!("{} already sets PATH", profile.display()));
    }
    Ok(())
}

pub async fn install_sqlpackage(ctx: &Context) -> Result<()> {
    let printer = ctx.printer.scoped("sqlpackage");
    printer.info("Installing sqlpackage...");
    let args: Vec<String> = ["tool", "install", "-g", SQLPACKAGE_TOOL].map(String::from).to_vec();
    process::run(&printer, &ctx.settings.dotnet_bin, &args, &ctx.root).await?;

    printer.info("Adding sqlpackage to path...");
    add_to_shell_profile(&ctx.scoped("sqlpackage"), ".zprofile", DOTNET_TOOLS_PATH_LINE)?;

    printer.done("sqlpackage added!");
    printer.success("Restart shell and run it using <sqlpackage>.");
    Ok(())
}

pub async fn uninstall_sqlpackage(ctx: &Context) -> Result<()> {
    let printer = ctx.printer.scoped("sqlpackage");
    printer.info("Uninstalling sqlpackage...");
    let args: Vec<String> = ["tool", "uninstall", "-g", SQLPACKAGE_TOOL].map(String::from).to_vec();
    process::run(&printer, &ctx.settings.dotnet_bin, &args, &ctx.root).await?;
    printer.success("sqlpackage uninstalled");
    Ok(())
}

async fn require_brew(ctx: &Context) -> Result<()> {
    if process::command_exists(&ctx.settings.brew_bin).await {
        return Ok(());
    }
    Err(OptiError::MissingPrerequisite {
        tool: "brew".to_string(),
        hint: format!("Homebrew is required to install dotnet SDK. Install homebrew from: {BREW_INSTALL_URL}"),
    })
}

pub async fn install_dotnet(ctx: &Context, version: &str) -> Result<()> {
    require_brew(ctx).await?;
    let printer = ctx.printer.scoped("dotnet");
    printer.info(&format!("Installing dotnet SDK {version}..."));
    let args = vec!["install".to_string(), format!("dotnet@{version}")];
    process::run(&printer, &ctx.settings.brew_bin, &args, &ctx.root).await?;
    printer.success(&format!("Dotnet SDK {version} installed successfully!"));

    printer.info("Adding SDK to path...");
    add_to_shell_profile(&ctx.scoped("dotnet"), ".zshrc", DOTNET_PATH_LINE)?;

    printer.done("Dotnet SDK installation complete!");
    printer.success("Restart your terminal or run: source ~/.zshrc");
    Ok(())
}

pub async fn uninstall_dotnet(ctx: &Context, version: &str) -> Result<()> {
    require_brew(ctx).await?;
    let printer = ctx.printer.scoped("dotnet");
    printer.info(&format!("Uninstalling dotnet SDK {version}..."));
    let args = vec!["uninstall".to_string(), format!("dotnet@{version}")];
    process::run(&printer, &ctx.settings.brew_bin, &args, &ctx.root).await?;
    printer.success(&format!("Dotnet SDK {version} uninstalled"));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn append_line_once_is_idempotent() {
        let tmp = tempdir().unwrap();
        let profile = tmp.path().join(".zprofile");
        fs::write(&profile, "alias ll='ls -l'").unwrap();

        assert!(append_line_once(&profile, DOTNET_TOOLS_PATH_LINE).unwrap());
        assert!(!append_line_once(&profile, DOTNET_TOOLS_PATH_LINE).unwrap());
        assert_eq!(
            fs::read_to_string(&profile).unwrap(),
            format!("alias ll='ls -l'\n{DOTNET_TOOLS_PATH_LINE}\n")
        );
    }

    #[test]
    fn append_line_once_creates_missing_file() {
        let tmp = tempdir().unwrap();
        let profile = tmp.path().join(".zshrc");
        assert!(append_line_once(&profile, DOTNET_PATH_LINE).unwrap());
        assert_eq!(fs::read_to_string(&profile).unwrap(), format!("{DOTNET_PATH_LINE}\n"));
    }
}
