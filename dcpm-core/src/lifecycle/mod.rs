//! Install / uninstall lifecycle.
//!
//! A project is `Installed` while `running_config/running.json` holds a
//! record of what was started, and `Uninstalled` otherwise. Uninstall only
//! ever reads that record, so tearing a stack down never needs the override
//! values it was installed with.

mod running;

pub use running::{RunningConfig, RunningStore, RENDERED_DIR, RUNNING_FILE};

use crate::compose::{ComposeParser, ServiceId};
use crate::engine::{self, ContainerEngine, Deployment, EngineOutput};
use crate::error::{DcpmError, Result};
use crate::project::Project;
use crate::render::{RenderedOutput, Renderer};
use crate::validate;
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Install state of a project.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleState {
    Uninstalled,
    Installed(RunningConfig),
}

/// Result of a successful install.
#[derive(Debug, Clone)]
pub struct InstallReport {
    /// What is running now.
    pub config: RunningConfig,
    /// Output of the engine's `up`.
    pub output: EngineOutput,
    /// Install torn down to make room for this one.
    pub replaced: Option<RunningConfig>,
}

/// Result of an uninstall.
#[derive(Debug, Clone)]
pub enum UninstallOutcome {
    /// No install was recorded; nothing was touched.
    NotInstalled,
    Uninstalled { project: String, services: Vec<ServiceId>, output: EngineOutput },
}

/// Drives installs and uninstalls through a container engine.
pub struct LifecycleManager {
    engine: Arc<dyn ContainerEngine>,
}

impl LifecycleManager {
    pub fn new(engine: Arc<dyn ContainerEngine>) -> Self {
        Self { engine }
    }

    /// Current install state of the project at `root`.
    pub fn state(&self, root: &Path) -> Result<LifecycleState> {
        validate::validate(root)?;
        let store = RunningStore::new(&Project::new(root));
        Ok(match store.load()? {
            Some(config) => LifecycleState::Installed(config),
            None => LifecycleState::Uninstalled,
        })
    }

    /// Render the project and bring its services up.
    ///
    /// The whole tree is rendered before the engine is touched. A project
    /// that is already installed is torn down and replaced. If the engine
    /// fails to start the new stack, or the install cannot be recorded, a
    /// best-effort teardown runs and the rendered files are removed before
    /// the error is returned.
    #[instrument(skip_all, fields(project = %root.display(), engine = self.engine.name()))]
    pub async fn install(&self, root: &Path, overrides: Option<&Path>) -> Result<InstallReport> {
        let renderer = Renderer::load(root, overrides)?;
        let output = renderer.render()?;
        self.deploy(&renderer.tree().project, output).await
    }

    /// Install a stack rendered beforehand into `rendered_dir`.
    ///
    /// The files are copied into the project's `running_config/` like a
    /// regular install, so `uninstall` works from the record afterwards.
    #[instrument(
        skip_all,
        fields(project = %root.display(), rendered = %rendered_dir.display())
    )]
    pub async fn install_rendered(
        &self,
        root: &Path,
        rendered_dir: &Path,
    ) -> Result<InstallReport> {
        validate::validate(root)?;
        let output = RenderedOutput::read_from(rendered_dir)?;
        self.deploy(&Project::new(root), output).await
    }

    async fn deploy(&self, project: &Project, output: RenderedOutput) -> Result<InstallReport> {
        let project_name = compose_project_name(project)?;
        let compose = ComposeParser::discover(&output, &project_name)?;
        if compose.is_empty() {
            return Err(DcpmError::NothingToInstall { project: project.root().to_path_buf() });
        }

        let store = RunningStore::new(project);
        let replaced = match store.load()? {
            Some(previous) => {
                info!(previous = %previous.project, "Project already installed, replacing");
                self.engine.down(&previous.deployment(&store.rendered_dir())).await?;
                store.clear()?;
                Some(previous)
            }
            None => None,
        };

        let working_dir = store.stage(&output)?;
        let deployment = Deployment {
            project_name: project_name.clone(),
            working_dir,
            compose_files: compose.files,
            services: compose.services,
        };

        let up_output = match self.engine.up(&deployment).await {
            Ok(output) => output,
            Err(e) => {
                error!(error = %e, "Failed to start services, rolling back");
                self.rollback(&store, &deployment).await;
                return Err(e);
            }
        };

        let config = RunningConfig {
            project: project_name,
            compose_files: deployment.compose_files.clone(),
            services: deployment.services.clone(),
            installed_at: Utc::now(),
        };
        if let Err(e) = store.save(&config) {
            error!(error = %e, "Failed to record install, rolling back");
            self.rollback(&store, &deployment).await;
            return Err(e);
        }

        info!(services = config.services.len(), "Project installed");
        Ok(InstallReport { config, output: up_output, replaced })
    }

    /// Tear down whatever the last install recorded.
    ///
    /// If the engine fails, the record is kept so the uninstall can be retried.
    #[instrument(skip_all, fields(project = %root.display(), engine = self.engine.name()))]
    pub async fn uninstall(&self, root: &Path) -> Result<UninstallOutcome> {
        validate::validate(root)?;

        let store = RunningStore::new(&Project::new(root));
        let Some(config) = store.load()? else {
            info!("Nothing installed");
            return Ok(UninstallOutcome::NotInstalled);
        };

        let output = self.engine.down(&config.deployment(&store.rendered_dir())).await?;
        store.clear()?;

        info!(services = config.services.len(), "Project uninstalled");
        Ok(UninstallOutcome::Uninstalled {
            project: config.project,
            services: config.services,
            output,
        })
    }

    /// Tear down the stack described by the compose documents in `rendered_dir`.
    ///
    /// The engine brings the whole compose project down, so any install
    /// record of the project is cleared as well.
    #[instrument(
        skip_all,
        fields(project = %root.display(), rendered = %rendered_dir.display())
    )]
    pub async fn uninstall_rendered(
        &self,
        root: &Path,
        rendered_dir: &Path,
    ) -> Result<UninstallOutcome> {
        validate::validate(root)?;

        let project = Project::new(root);
        let project_name = compose_project_name(&project)?;
        let rendered = RenderedOutput::read_from(rendered_dir)?;
        let compose = ComposeParser::discover(&rendered, &project_name)?;
        if compose.is_empty() {
            return Err(DcpmError::NothingToInstall { project: rendered_dir.to_path_buf() });
        }

        let deployment = Deployment {
            project_name,
            working_dir: rendered_dir.to_path_buf(),
            compose_files: compose.files,
            services: compose.services,
        };
        let output = self.engine.down(&deployment).await?;
        RunningStore::new(&project).clear()?;

        info!(services = deployment.services.len(), "Rendered stack uninstalled");
        Ok(UninstallOutcome::Uninstalled {
            project: deployment.project_name,
            services: deployment.services,
            output,
        })
    }

    async fn rollback(&self, store: &RunningStore, deployment: &Deployment) {
        warn!(project = %deployment.project_name, "Rolling back install");

        if let Err(e) = self.engine.down(deployment).await {
            warn!(error = %e, "Failed to tear down services during rollback");
        }

        if let Err(e) = store.remove_rendered() {
            warn!(error = %e, "Failed to remove rendered files during rollback");
        }
    }
}

/// Compose project name derived from the project directory's real name.
fn compose_project_name(project: &Project) -> Result<String> {
    let root = project.root().canonicalize().map_err(|e| DcpmError::io(project.root(), e))?;
    Ok(engine::project_name(&Project::new(root).name()))
}
