//! `dcpm install` / `dcpm uninstall`

use anyhow::Result;
use colored::Colorize;
use dcpm_core::{DockerComposeEngine, LifecycleManager, ServiceId, Settings, UninstallOutcome};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct ServiceRow {
    #[tabled(rename = "SERVICE")]
    name: String,
    #[tabled(rename = "CONTAINER")]
    container: String,
    #[tabled(rename = "IMAGE")]
    image: String,
    #[tabled(rename = "COMPOSE FILE")]
    compose_file: String,
}

/// Where `install` takes the stack from.
pub enum Source {
    /// Render the project, optionally with an override values file.
    Render { values: Option<PathBuf> },
    /// Use a configuration rendered beforehand.
    Rendered(PathBuf),
}

/// Render the project (or take a rendered configuration) and start its services.
pub async fn install(settings: &Settings, project: &Path, source: Source) -> Result<()> {
    let manager = manager(settings);

    let spinner = spinner(format!("Installing {}...", project.display()));
    let result = match &source {
        Source::Render { values } => manager.install(project, values.as_deref()).await,
        Source::Rendered(dir) => manager.install_rendered(project, dir).await,
    };
    spinner.finish_and_clear();
    let report = result?;

    if let Some(previous) = &report.replaced {
        println!(
            "{} Replaced previous install ({} service(s))",
            "→".cyan().bold(),
            previous.services.len()
        );
    }

    println!("docker result:");
    let output = report.output.combined();
    if !output.is_empty() {
        println!("{}", output);
    }
    println!();

    println!(
        "{} Installed {} ({} service(s))",
        "✓".green().bold(),
        report.config.project.bold(),
        report.config.services.len()
    );
    print_services(&report.config.services);

    Ok(())
}

/// Stop the services recorded by the last install, or those of a rendered configuration.
pub async fn uninstall(settings: &Settings, project: &Path, config: Option<PathBuf>) -> Result<()> {
    let manager = manager(settings);

    let spinner = spinner(format!("Uninstalling {}...", project.display()));
    let result = match &config {
        Some(dir) => manager.uninstall_rendered(project, dir).await,
        None => manager.uninstall(project).await,
    };
    spinner.finish_and_clear();

    match result? {
        UninstallOutcome::NotInstalled => {
            println!("{}", "nothing to uninstall".dimmed());
        }
        UninstallOutcome::Uninstalled { project, services, output } => {
            let output = output.combined();
            if !output.is_empty() {
                println!("docker result:");
                println!("{}", output);
                println!();
            }
            println!(
                "{} Uninstalled {} ({} service(s) removed)",
                "✓".green().bold(),
                project.bold(),
                services.len()
            );
            print_services(&services);
        }
    }

    Ok(())
}

fn manager(settings: &Settings) -> LifecycleManager {
    LifecycleManager::new(Arc::new(DockerComposeEngine::from_settings(settings)))
}

fn spinner(message: String) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

fn print_services(services: &[ServiceId]) {
    if services.is_empty() {
        return;
    }

    let rows: Vec<ServiceRow> = services
        .iter()
        .map(|s| ServiceRow {
            name: s.name.clone(),
            container: s.container_name.clone(),
            image: s.image.clone().unwrap_or_else(|| "-".to_string()),
            compose_file: s.compose_file.display().to_string(),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{}", table);
}
