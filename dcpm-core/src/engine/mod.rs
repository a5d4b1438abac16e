//! Container engine abstraction.
//!
//! The lifecycle manager never talks to docker directly: it hands a
//! [`Deployment`] to a [`ContainerEngine`]. `DockerComposeEngine` drives the
//! docker compose CLI; tests substitute a recording fake.

use crate::compose::ServiceId;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

mod docker;

pub use docker::DockerComposeEngine;

/// A set of compose documents brought up or torn down together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    /// Compose project name (`-p`).
    pub project_name: String,
    /// Directory holding the rendered stack.
    pub working_dir: PathBuf,
    /// Compose documents, relative to `working_dir`.
    pub compose_files: Vec<PathBuf>,
    /// Services the documents define.
    pub services: Vec<ServiceId>,
}

impl Deployment {
    /// Compose documents as absolute paths.
    pub fn compose_paths(&self) -> Vec<PathBuf> {
        self.compose_files.iter().map(|f| self.working_dir.join(f)).collect()
    }
}

/// Captured output of an engine command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineOutput {
    pub stdout: String,
    pub stderr: String,
}

impl EngineOutput {
    /// stdout followed by stderr, trimmed.
    pub fn combined(&self) -> String {
        let mut text = self.stdout.trim_end().to_string();
        let stderr = self.stderr.trim_end();
        if !text.is_empty() && !stderr.is_empty() {
            text.push('\n');
        }
        text.push_str(stderr);
        text
    }
}

/// Container engine trait.
///
/// Both operations are all-or-nothing from the caller's point of view: an
/// error means the engine reported failure, whatever it managed to start.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Create and start every service of the deployment.
    async fn up(&self, deployment: &Deployment) -> Result<EngineOutput>;

    /// Stop and remove every service of the deployment.
    async fn down(&self, deployment: &Deployment) -> Result<EngineOutput>;

    /// Get engine name (for logging).
    fn name(&self) -> &str;
}

/// Compose project name for a project directory name.
///
/// Lower-cased, with every character outside `[a-z0-9_-]` replaced by `-`.
/// Compose rejects names that do not start with a letter or digit, so
/// leading separators are dropped.
pub fn project_name(dir_name: &str) -> String {
    let name: String = dir_name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '-' })
        .collect();
    let name = name.trim_start_matches(['-', '_']);
    if name.is_empty() {
        "dcpm".to_string()
    } else {
        name.to_string()
    }
}
