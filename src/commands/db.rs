use crate::appsettings;
use crate::config::ENGINE_PORT;
use crate::connection;
use crate::context::Context;
use crate::docker::{self, Docker};
use crate::error::{OptiError, Result};
use crate::files::{self, Match};
use crate::ports;
use crate::prereq;
use crate::project::{self, ProjectConfig};
use crate::prompt::{self, Choice};
use crate::snapshot;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct SetupOptions {
    pub port: Option<String>,
    pub name: Option<String>,
    /// Destroy the existing stack before importing, without asking.
    pub kill: bool,
    /// Import without asking.
    pub yes: bool,
    pub no_import: bool,
}

fn path_choices(ctx: &Context, paths: Vec<PathBuf>) -> Vec<Choice<PathBuf>> {
    paths
        .into_iter()
        .map(|p| Choice {
            label: ctx.display_path(&p),
            value: p,
        })
        .collect()
}

pub fn select_snapshot(ctx: &Context) -> Result<PathBuf> {
    let found = files::search(&ctx.root, Match::Extension("bacpac"));
    if found.is_empty() {
        return Err(OptiError::missing_input(
            "No bacpac files found! Are you sure there are any .bacpac files in this project?",
            Some("Put your .bacpac files in .opti/bacpac (see <opti init>)"),
        ));
    }
    prompt::select("What .bacpac do you want to use?", path_choices(ctx, found))
}

pub fn select_appsettings(ctx: &Context) -> Result<PathBuf> {
    let found = appsettings::discover(&ctx.root);
    if found.is_empty() {
        return Err(OptiError::missing_input(
            format!(
                "No {} or {} found in this project",
                appsettings::DEVELOPMENT_FILE,
                appsettings::BASE_FILE
            ),
            Some("Run the command from the root of the web project"),
        ));
    }
    prompt::select("What appsettings do you want to use?", path_choices(ctx, found))
}

/// Write the connection string into `settings_file` and report where.
pub fn apply_connection_string(ctx: &Context, settings_file: &Path, connection_string: &str) -> Result<()> {
    let printer = ctx.printer.scoped("constr");
    appsettings::update_file(settings_file, &ctx.settings.connection_string_key, connection_string)?;
    printer.success("Updated connection string");
    printer.path("Updated in", &ctx.display_path(settings_file));
    Ok(())
}

/// Resolve `(port, container name)` from the flags, allocating a port when
/// none was given.
pub async fn resolve_options(ctx: &Context, opts: &SetupOptions) -> Result<(String, String)> {
    let port = match &opts.port {
        Some(raw) => ports::normalize_spec(raw)?,
        None => {
            let docker = Docker::new(ctx);
            let host = ports::allocate(&docker, &ctx.printer, ctx.settings.default_port).await?;
            let spec = format!("{host}:{ENGINE_PORT}");
            ctx.printer
                .neutral(&format!("No port passed, use --port to set it. Using {spec}."));
            spec
        }
    };

    let name = match opts.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        Some(n) => n.to_string(),
        None => {
            let prefix = &ctx.settings.container_prefix;
            ctx.printer.neutral(&format!(
                "No container name included, use --name to set it (ex. KS, FF). Using default ({prefix}-<port>)."
            ));
            format!("{prefix}-{}", connection::host_port(&port))
        }
    };

    Ok((port, name))
}

/// File side of setup: settings file, compose descriptor and project record.
pub fn write_project_files(
    ctx: &Context,
    snapshot_path: &Path,
    settings_file: &Path,
    port: &str,
    name: &str,
) -> Result<ProjectConfig> {
    let cfg = ProjectConfig::new(&snapshot_path.display().to_string(), name, port);

    apply_connection_string(ctx, settings_file, &cfg.connection_string)?;

    let printer = ctx.printer.scoped("docker");
    let descriptor = docker::descriptor(&ctx.settings, name, port);
    let path = docker::write_descriptor(&ctx.root, &descriptor)?;
    printer.success(&format!("Created {} in project root", docker::DESCRIPTOR_FILE));
    printer.path("Created in", &ctx.display_path(&path));

    let path = project::write(&ctx.root, &cfg)?;
    ctx.printer.scoped("config").path("Saved", &ctx.display_path(&path));
    Ok(cfg)
}

async fn handle_import(ctx: &Context, cfg: &ProjectConfig, kill: bool, force: bool) -> Result<()> {
    if !prompt::confirm_or_forced("Do you want to import the .bacpac now?", force)? {
        return Ok(());
    }
    let destroy = prompt::confirm_or_forced(
        "Delete the existing database and server, if it exists? (required for consecutive imports)",
        kill,
    )?;
    if destroy {
        Docker::new(ctx).destroy().await?;
    }
    snapshot::import_snapshot(ctx, cfg).await
}

pub async fn setup(ctx: &Context, opts: &SetupOptions) -> Result<ProjectConfig> {
    prereq::check_database_tooling(ctx).await?;

    let (port, name) = resolve_options(ctx, opts).await?;

    ctx.printer.env("Port", &port);
    ctx.printer.env("Container", &name);
    ctx.printer.env("Project", &ctx.project_name());
    ctx.printer.env("cwd", &ctx.root.display().to_string());
    ctx.printer.group();

    let snapshot_path = select_snapshot(ctx)?;
    let settings_file = select_appsettings(ctx)?;

    let cfg = write_project_files(ctx, &snapshot_path, &settings_file, &port, &name)?;

    if opts.no_import {
        ctx.printer.done("Project is configured!");
    } else {
        handle_import(ctx, &cfg, opts.kill, opts.yes).await?;
        ctx.printer.done("Database is ready!");
    }
    ctx.printer.neutral(
        "In the future run <opti db up (or start)> in the project root to start the database, \
<opti db down (or stop)> to stop it and <opti db kill> to permanently remove it.",
    );
    Ok(cfg)
}

pub async fn up(ctx: &Context) -> Result<()> {
    let cfg = project::read(&ctx.root)?;
    Docker::new(ctx)
        .ensure_running(&cfg.container_name, &ctx.settings)
        .await?;
    ctx.printer.done("Database is ready!");
    Ok(())
}

pub async fn down(ctx: &Context) -> Result<()> {
    project::read(&ctx.root)?;
    Docker::new(ctx).stop().await?;
    ctx.printer.done("Database is shut down.");
    Ok(())
}

/// Remove the stack. The project record stays.
pub async fn kill(ctx: &Context) -> Result<()> {
    project::read(&ctx.root)?;
    Docker::new(ctx).destroy().await?;
    ctx.printer.done("Database is removed.");
    Ok(())
}

pub async fn apply(ctx: &Context) -> Result<()> {
    let cfg = project::read(&ctx.root)?;
    let settings_file = select_appsettings(ctx)?;
    apply_connection_string(ctx, &settings_file, &cfg.connection_string)
}

/// Destroy the stack and re-import the configured snapshot.
pub async fn import(ctx: &Context, yes: bool) -> Result<()> {
    let cfg = project::read(&ctx.root)?;
    ctx.printer.info("Running only import");
    if !prompt::confirm_or_forced(
        &format!("This deletes the {} database and re-imports it. Continue?", cfg.database_name),
        yes,
    )? {
        return Err(OptiError::Cancelled("Import skipped".to_string()));
    }
    Docker::new(ctx).destroy().await?;
    snapshot::import_snapshot(ctx, &cfg).await?;
    ctx.printer.done("Database is ready!");
    Ok(())
}

pub async fn export(ctx: &Context, yes: bool) -> Result<()> {
    let cfg = project::read(&ctx.root)?;
    ctx.printer.info("Running export");
    let target = snapshot::export_file_name(&cfg.database_name);
    let question = format!(
        "Export {} to {target}? An existing file is overwritten.",
        cfg.database_name
    );
    if !prompt::confirm_or_forced(&question, yes)? {
        return Err(OptiError::Cancelled("Export skipped".to_string()));
    }
    Docker::new(ctx)
        .ensure_running(&cfg.container_name, &ctx.settings)
        .await?;
    snapshot::export_snapshot(ctx, &cfg.connection_string, &cfg.database_name).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::printer::Printer;
    use std::fs;
    use tempfile::tempdir;

    fn ctx(root: &Path) -> Context {
        Context::new(root.to_path_buf(), Settings::default(), Printer::new("test", false))
    }

    #[tokio::test]
    async fn explicit_port_and_default_name() {
        let tmp = tempdir().unwrap();
        let opts = SetupOptions {
            port: Some("1500".to_string()),
            ..Default::default()
        };
        let (port, name) = resolve_options(&ctx(tmp.path()), &opts).await.unwrap();
        assert_eq!(port, "1500:1433");
        assert_eq!(name, "sqledge-1500");
    }

    #[tokio::test]
    async fn explicit_name_wins_and_bad_port_fails() {
        let tmp = tempdir().unwrap();
        let opts = SetupOptions {
            port: Some("1501:1433".to_string()),
            name: Some("KS".to_string()),
            ..Default::default()
        };
        let (_, name) = resolve_options(&ctx(tmp.path()), &opts).await.unwrap();
        assert_eq!(name, "KS");

        let bad = SetupOptions {
            port: Some("abc".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            resolve_options(&ctx(tmp.path()), &bad).await,
            Err(OptiError::MissingInput { .. })
        ));
    }

    #[test]
    fn project_files_share_one_connection_string() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        let snapshot = root.join(".opti/bacpac/Clinic.bacpac");
        fs::create_dir_all(snapshot.parent().unwrap()).unwrap();
        fs::write(&snapshot, "").unwrap();
        let settings = root.join("src/Web/appsettings.Development.json");
        fs::create_dir_all(settings.parent().unwrap()).unwrap();
        fs::write(&settings, r#"{"ConnectionStrings":{"EPiServerDB":""},"AllowedHosts":"*"}"#).unwrap();

        let ctx = ctx(root);
        assert_eq!(select_snapshot(&ctx).unwrap(), snapshot);
        assert_eq!(select_appsettings(&ctx).unwrap(), settings);

        let cfg = write_project_files(&ctx, &snapshot, &settings, "1434:1433", "sqledge-1434").unwrap();
        let expected = connection::assemble("1434:1433", "sqledge-1434", "Clinic");
        assert_eq!(cfg.connection_string, expected);
        assert_eq!(project::read(root).unwrap(), cfg);

        let doc: serde_json::Value = serde_json::from_str(&fs::read_to_string(&settings).unwrap()).unwrap();
        assert_eq!(doc["ConnectionStrings"]["EPiServerDB"], expected.as_str());
        assert_eq!(doc["AllowedHosts"], "*");

        let compose = fs::read_to_string(root.join(docker::DESCRIPTOR_FILE)).unwrap();
        assert!(compose.contains("container_name: sqledge-1434"));
    }

    #[test]
    fn discovery_failures_are_missing_input() {
        let tmp = tempdir().unwrap();
        let ctx = ctx(tmp.path());
        assert!(matches!(select_snapshot(&ctx), Err(OptiError::MissingInput { .. })));
        assert!(matches!(select_appsettings(&ctx), Err(OptiError::MissingInput { .. })));
    }
}
