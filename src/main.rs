use anyhow::{Context as _, Result};
use clap::{Args, Parser, Subcommand};
use opti_cli::commands::{db, init, watch};
use opti_cli::context::Context;
use opti_cli::error::OptiError;
use opti_cli::prereq;
use opti_cli::printer::Printer;
use std::process::ExitCode;

/// Team Optimizely CLI tools.
#[derive(Parser, Debug)]
#[command(name = "opti", version, about = "Local database and tooling setup for .NET web projects", long_about = None)]
struct Cli {
    /// Print every external command before it runs.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Basic setup for using opti: .opti directory, bacpac folder, .gitignore entry.
    Init,

    /// Configure the project's connection string, create a docker-compose.yml for an
    /// Azure SQL Edge container and import a .bacpac.
    ///
    /// Without an action this runs the full setup. Put your .bacpac files in
    /// .opti/bacpac (or anywhere in the project) first.
    Db(DbArgs),

    /// Install the dotnet SDK for a specific version using Homebrew.
    Dotnet {
        /// SDK version to install (e.g. 8.0).
        #[arg(default_value = "8.0")]
        version: String,

        /// Uninstall the dotnet SDK for the given version.
        #[arg(short, long)]
        uninstall: bool,
    },

    /// Install sqlpackage with the dotnet cli.
    Sqlpackage {
        /// Uninstall sqlpackage.
        #[arg(short, long)]
        uninstall: bool,
    },

    /// Run dotnet watch with a specific profile from launchSettings.json.
    Watch {
        /// Launch profile name. Prompted for when omitted.
        #[arg(long)]
        profile: Option<String>,

        /// Open the profile's application URL in the browser.
        #[arg(long)]
        open: bool,
    },
}

#[derive(Args, Debug)]
#[command(args_conflicts_with_subcommands = true)]
struct DbArgs {
    #[command(subcommand)]
    action: Option<DbAction>,

    #[command(flatten)]
    setup: SetupArgs,
}

#[derive(Args, Debug)]
struct SetupArgs {
    /// Host port, or host:container pair. Defaults to the first free port from 1433.
    #[arg(short, long)]
    port: Option<String>,

    /// Name of the database container (defaults to <prefix>-<port>).
    #[arg(short, long)]
    name: Option<String>,

    /// Kill the existing container stack and database before importing.
    #[arg(short, long)]
    kill: bool,

    /// Import without asking for confirmation.
    #[arg(short, long)]
    yes: bool,

    /// Only write the config files; skip the .bacpac import.
    #[arg(long)]
    no_import: bool,
}

#[derive(Subcommand, Debug)]
enum DbAction {
    /// Start the database container stack and wait until it is ready.
    #[command(visible_alias = "start")]
    Up,

    /// Stop the database container stack.
    #[command(visible_alias = "stop")]
    Down,

    /// Remove the database container stack, its volumes and images.
    Kill,

    /// Apply the project's current connection string to an appsettings file.
    Apply,

    /// Destroy the existing database and re-import the configured .bacpac.
    Import {
        /// Do not ask for confirmation.
        #[arg(short, long)]
        yes: bool,
    },

    /// Export the current database to backup-<db>.bacpac.
    Export {
        /// Do not ask for confirmation.
        #[arg(short, long)]
        yes: bool,
    },
}

async fn dispatch(ctx: &Context, command: Command) -> Result<(), OptiError> {
    match command {
        Command::Init => init::init(&ctx.scoped("init")).map(|_| ()),
        Command::Db(args) => {
            let ctx = ctx.scoped("db");
            match args.action {
                None => {
                    let opts = db::SetupOptions {
                        port: args.setup.port,
                        name: args.setup.name,
                        kill: args.setup.kill,
                        yes: args.setup.yes,
                        no_import: args.setup.no_import,
                    };
                    db::setup(&ctx, &opts).await.map(|_| ())
                }
                Some(DbAction::Up) => db::up(&ctx).await,
                Some(DbAction::Down) => db::down(&ctx).await,
                Some(DbAction::Kill) => db::kill(&ctx).await,
                Some(DbAction::Apply) => db::apply(&ctx).await,
                Some(DbAction::Import { yes }) => db::import(&ctx, yes).await,
                Some(DbAction::Export { yes }) => db::export(&ctx, yes).await,
            }
        }
        Command::Dotnet { version, uninstall } => {
            if uninstall {
                prereq::uninstall_dotnet(ctx, &version).await
            } else {
                prereq::install_dotnet(ctx, &version).await
            }
        }
        Command::Sqlpackage { uninstall } => {
            if uninstall {
                prereq::uninstall_sqlpackage(ctx).await
            } else {
                prereq::install_sqlpackage(ctx).await
            }
        }
        Command::Watch { profile, open } => watch::watch(ctx, profile.as_deref(), open).await,
    }
}

async fn run(cli: Cli) -> Result<()> {
    let root = std::env::current_dir().context("Failed to get current directory")?;
    let ctx = Context::load(root, cli.verbose);
    dispatch(&ctx, cli.command).await?;
    Ok(())
}

/// Map a failure to a short labeled message, a hint, and the exit code.
fn report(err: anyhow::Error) -> ExitCode {
    let printer = Printer::new("opti", false);
    let Some(err) = err.downcast_ref::<OptiError>() else {
        printer.error(&format!("{err:#}"));
        return ExitCode::FAILURE;
    };

    match err {
        OptiError::Cancelled(msg) => printer.info(msg),
        OptiError::ExternalProcessFailure { stderr, .. } => {
            printer.error(&err.to_string());
            for line in stderr {
                printer.detail(line);
            }
        }
        _ => printer.error(&err.to_string()),
    }
    if let Some(hint) = err.hint() {
        printer.help(&hint);
    }
    ExitCode::from(err.exit_code())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report(e),
    }
}
