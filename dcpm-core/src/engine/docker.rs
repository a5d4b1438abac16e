//! Docker compose CLI integration.

use super::{ContainerEngine, Deployment, EngineOutput};
use crate::config::Settings;
use crate::error::{DcpmError, Result};
use async_trait::async_trait;
use std::ffi::OsString;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// Runs `docker compose` (or a compatible CLI) as a child process.
#[derive(Debug, Clone)]
pub struct DockerComposeEngine {
    /// Engine executable, e.g. `docker` or `podman`.
    binary: String,
    /// Compose subcommand; empty for standalone `docker-compose`.
    subcommand: String,
}

impl DockerComposeEngine {
    pub fn new(binary: impl Into<String>, subcommand: impl Into<String>) -> Self {
        Self { binary: binary.into(), subcommand: subcommand.into() }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.engine_binary, &settings.compose_subcommand)
    }

    /// Arguments for `up`: `[compose] -p <project> --project-directory <dir> -f <file>... up -d`.
    pub fn up_args(&self, deployment: &Deployment) -> Vec<OsString> {
        let mut args = self.base_args(deployment);
        args.extend(["up".into(), "-d".into()]);
        args
    }

    /// Arguments for `down`: `[compose] ... down --remove-orphans`.
    pub fn down_args(&self, deployment: &Deployment) -> Vec<OsString> {
        let mut args = self.base_args(deployment);
        args.extend(["down".into(), "--remove-orphans".into()]);
        args
    }

    fn base_args(&self, deployment: &Deployment) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        if !self.subcommand.is_empty() {
            args.push(self.subcommand.clone().into());
        }
        args.push("-p".into());
        args.push(deployment.project_name.clone().into());
        args.push("--project-directory".into());
        args.push(deployment.working_dir.clone().into());
        for file in deployment.compose_paths() {
            args.push("-f".into());
            args.push(file.into());
        }
        args
    }

    async fn run(&self, operation: &str, args: Vec<OsString>) -> Result<EngineOutput> {
        debug!(binary = %self.binary, ?args, "Running container engine");

        let output = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| DcpmError::ContainerEngine {
                operation: operation.to_string(),
                reason: format!("failed to run {}: {}", self.binary, e),
            })?;

        let result = EngineOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        if !output.status.success() {
            let detail = result.combined();
            let reason = if detail.is_empty() { output.status.to_string() } else { detail };
            warn!(operation, status = %output.status, "Container engine command failed");
            return Err(DcpmError::ContainerEngine { operation: operation.to_string(), reason });
        }

        Ok(result)
    }
}

impl Default for DockerComposeEngine {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

#[async_trait]
impl ContainerEngine for DockerComposeEngine {
    #[instrument(skip(self, deployment), fields(project = %deployment.project_name))]
    async fn up(&self, deployment: &Deployment) -> Result<EngineOutput> {
        info!(services = deployment.services.len(), "Starting services");
        self.run("start services", self.up_args(deployment)).await
    }

    #[instrument(skip(self, deployment), fields(project = %deployment.project_name))]
    async fn down(&self, deployment: &Deployment) -> Result<EngineOutput> {
        info!(services = deployment.services.len(), "Stopping services");
        self.run("stop services", self.down_args(deployment)).await
    }

    fn name(&self) -> &str {
        &self.binary
    }
}
