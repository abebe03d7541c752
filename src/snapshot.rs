//! `.bacpac` import and export through `sqlpackage`.

use crate::context::Context;
use crate::docker::Docker;
use crate::error::Result;
use crate::process;
use crate::project::ProjectConfig;
use std::path::PathBuf;

pub fn import_args(snapshot_path: &str, connection_string: &str) -> Vec<String> {
    vec![
        "/Action:Import".to_string(),
        format!("/SourceFile:{snapshot_path}"),
        format!("/TargetConnectionString:{connection_string}"),
    ]
}

pub fn export_file_name(database_name: &str) -> String {
    format!("backup-{database_name}.bacpac")
}

pub fn export_args(connection_string: &str, database_name: &str) -> Vec<String> {
    vec![
        "/Action:Export".to_string(),
        format!("/TargetFile:{}", export_file_name(database_name)),
        format!("/SourceConnectionString:{connection_string}"),
    ]
}

/// Replace the target catalog with the configured snapshot. Starts the stack
/// and waits for readiness first if needed.
pub async fn import_snapshot(ctx: &Context, cfg: &ProjectConfig) -> Result<()> {
    let printer = ctx.printer.scoped("bacpac");
    Docker::new(ctx)
        .ensure_running(&cfg.container_name, &ctx.settings)
        .await?;

    printer.info("Starting .bacpac import...");
    printer.path("Source", &cfg.snapshot_path);
    let args = import_args(&cfg.snapshot_path, &cfg.connection_string);
    process::run(&printer, &ctx.settings.sqlpackage_bin, &args, &ctx.root).await?;
    printer.success("Database imported successfully!");
    Ok(())
}

/// Export the database to `backup-<name>.bacpac` in the project root,
/// overwriting a previous export.
pub async fn export_snapshot(ctx: &Context, connection_string: &str, database_name: &str) -> Result<PathBuf> {
    let printer = ctx.printer.scoped("bacpac");
    let args = export_args(connection_string, database_name);
    process::run(&printer, &ctx.settings.sqlpackage_bin, &args, &ctx.root).await?;

    let target = ctx.root.join(export_file_name(database_name));
    printer.success("Database exported successfully!");
    printer.path("Exported to", &ctx.display_path(&target));
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn import_arguments() {
        let args = import_args("/p/Clinic.bacpac", "Data Source=localhost,1433;Initial Catalog=Clinic");
        assert_eq!(
            args,
            vec![
                "/Action:Import",
                "/SourceFile:/p/Clinic.bacpac",
                "/TargetConnectionString:Data Source=localhost,1433;Initial Catalog=Clinic",
            ]
        );
    }

    #[test]
    fn export_target_is_named_after_database() {
        let args = export_args("cs", "Clinic");
        assert_eq!(args[0], "/Action:Export");
        assert_eq!(args[1], "/TargetFile:backup-Clinic.bacpac");
        assert_eq!(args[2], "/SourceConnectionString:cs");
    }
}
