use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use colored::Colorize;
use dcpm_core::{DcpmError, Settings};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

use commands::lifecycle::Source;

#[derive(Parser)]
#[command(name = "dcpm", version)]
#[command(about = "Package manager for docker compose projects", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a project and its dependencies into a directory
    Render {
        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        /// Project directory
        #[arg(short, long)]
        project: PathBuf,

        /// Values file overriding the project's values.yaml
        #[arg(short, long)]
        values: Option<PathBuf>,
    },

    /// Create or verify a project checksum
    #[command(subcommand)]
    Checksum(ChecksumCommands),

    /// Create an empty project
    Init {
        /// Directory of the new project
        path: PathBuf,
    },

    /// Render a project and start its services
    Install {
        /// Project directory
        project: PathBuf,

        /// Values file overriding the project's values.yaml
        #[arg(short, long, conflicts_with = "config")]
        values: Option<PathBuf>,

        /// Directory holding an already rendered configuration to start instead
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Stop the services started by the last install
    Uninstall {
        /// Project directory
        project: PathBuf,

        /// Directory holding the rendered configuration to stop
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ChecksumCommands {
    /// Compute the project checksum and write it to CHECKSUM
    Create {
        /// Project directory
        project: PathBuf,
    },

    /// Compare the project against its CHECKSUM file
    Check {
        /// Project directory
        project: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            report(&e.into());
            return ExitCode::FAILURE;
        }
    };
    init_logging(&settings.log_level);

    match run(cli, &settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, settings: &Settings) -> anyhow::Result<()> {
    match cli.command {
        Commands::Render { output, project, values } => {
            commands::render(&absolute(project)?, &absolute(output)?, absolute_opt(values)?)?;
        }

        Commands::Checksum(ChecksumCommands::Create { project }) => {
            commands::checksum::create(&absolute(project)?).await?;
        }

        Commands::Checksum(ChecksumCommands::Check { project }) => {
            commands::checksum::check(&absolute(project)?).await?;
        }

        Commands::Init { path } => {
            commands::init(&absolute(path)?)?;
        }

        Commands::Install { project, values, config } => {
            let source = match absolute_opt(config)? {
                Some(dir) => Source::Rendered(dir),
                None => Source::Render { values: absolute_opt(values)? },
            };
            commands::lifecycle::install(settings, &absolute(project)?, source).await?;
        }

        Commands::Uninstall { project, config } => {
            commands::lifecycle::uninstall(settings, &absolute(project)?, absolute_opt(config)?)
                .await?;
        }
    }

    Ok(())
}

/// Log filter: `DCPM_LOG`, then `RUST_LOG`, then the configured level. Logs go to stderr.
fn init_logging(default_level: &str) {
    let filter = std::env::var("DCPM_LOG")
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .or_else(|| EnvFilter::try_new(default_level).ok())
        .unwrap_or_else(|| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

/// Print a failure to stderr.
///
/// A checksum mismatch is printed verbatim since scripts compare it literally.
fn report(err: &anyhow::Error) {
    let mut stderr = std::io::stderr();
    if let Some(DcpmError::ChecksumMismatch) = err.downcast_ref::<DcpmError>() {
        let _ = write!(stderr, "{}", DcpmError::ChecksumMismatch);
    } else {
        let _ = writeln!(stderr, "{} {:#}", "error:".red().bold(), err);
    }
    let _ = stderr.flush();
}

fn absolute(path: PathBuf) -> anyhow::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

fn absolute_opt(path: Option<PathBuf>) -> anyhow::Result<Option<PathBuf>> {
    path.map(absolute).transpose()
}
