//! Persisted install state inside `running_config/`.
//!
//! ```text
//! running_config/
//! ├── running.json    # RunningConfig of the current install
//! └── rendered/       # the rendered stack the engine was started from
//! ```

use crate::compose::ServiceId;
use crate::engine::Deployment;
use crate::error::{DcpmError, Result};
use crate::project::Project;
use crate::render::RenderedOutput;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Record of the current install.
pub const RUNNING_FILE: &str = "running.json";
/// Rendered stack of the current install.
pub const RENDERED_DIR: &str = "rendered";

/// What an install brought up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunningConfig {
    /// Compose project name.
    pub project: String,
    /// Compose documents, relative to the rendered directory.
    pub compose_files: Vec<PathBuf>,
    pub services: Vec<ServiceId>,
    pub installed_at: DateTime<Utc>,
}

impl RunningConfig {
    /// Deployment that tears down (or re-creates) exactly the recorded services.
    pub fn deployment(&self, rendered_dir: &Path) -> Deployment {
        Deployment {
            project_name: self.project.clone(),
            working_dir: rendered_dir.to_path_buf(),
            compose_files: self.compose_files.clone(),
            services: self.services.clone(),
        }
    }
}

/// Reads and writes the install state of one project.
#[derive(Debug, Clone)]
pub struct RunningStore {
    dir: PathBuf,
}

impl RunningStore {
    pub fn new(project: &Project) -> Self {
        Self { dir: project.running_config_dir() }
    }

    pub fn record_path(&self) -> PathBuf {
        self.dir.join(RUNNING_FILE)
    }

    pub fn rendered_dir(&self) -> PathBuf {
        self.dir.join(RENDERED_DIR)
    }

    /// Load the current record. A missing or blank record means nothing is installed.
    pub fn load(&self) -> Result<Option<RunningConfig>> {
        let path = self.record_path();
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path).map_err(|e| DcpmError::io(&path, e))?;
        if content.trim().is_empty() {
            debug!(path = %path.display(), "Running config is empty");
            return Ok(None);
        }

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| DcpmError::InvalidRunningConfig { path, reason: e.to_string() })
    }

    /// Persist `config`, replacing any previous record.
    pub fn save(&self, config: &RunningConfig) -> Result<()> {
        let path = self.record_path();
        let tmp = self.dir.join(format!("{}.tmp", RUNNING_FILE));
        let content = serde_json::to_string_pretty(config).map_err(|e| DcpmError::Other(e.into()))?;

        std::fs::write(&tmp, content).map_err(|e| DcpmError::io(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| DcpmError::io(&path, e))?;
        info!(path = %path.display(), services = config.services.len(), "Saved running config");
        Ok(())
    }

    /// Write `output` into a staging directory, then move it into place as `rendered/`.
    pub fn stage(&self, output: &RenderedOutput) -> Result<PathBuf> {
        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&self.dir)
            .map_err(|e| DcpmError::io(&self.dir, e))?;
        output.write_to(staging.path())?;

        self.remove_rendered()?;
        let rendered = self.rendered_dir();
        std::fs::rename(staging.path(), &rendered).map_err(|e| DcpmError::io(&rendered, e))?;
        debug!(path = %rendered.display(), files = output.len(), "Staged rendered stack");
        Ok(rendered)
    }

    /// Remove the rendered stack, if any.
    pub fn remove_rendered(&self) -> Result<()> {
        let rendered = self.rendered_dir();
        if rendered.exists() {
            std::fs::remove_dir_all(&rendered).map_err(|e| DcpmError::io(&rendered, e))?;
        }
        Ok(())
    }

    /// Forget the current install: remove the record and the rendered stack.
    pub fn clear(&self) -> Result<()> {
        let path = self.record_path();
        if path.exists() {
            std::fs::remove_file(&path).map_err(|e| DcpmError::io(&path, e))?;
        }
        self.remove_rendered()
    }
}
