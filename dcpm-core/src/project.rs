//! Project layout and the in-memory dependency tree.
//!
//! A project is a directory holding default values, templates, the running
//! configuration of the last install, and nested dependency projects:
//!
//! ```text
//! my-stack/
//! ├── values.yaml
//! ├── templates/
//! ├── running_config/
//! ├── dependencies/
//! │   └── cache/          # a nested project with the same layout
//! └── CHECKSUM            # optional
//! ```

use crate::error::{DcpmError, Result};
use crate::validate;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// Default values file.
pub const VALUES_FILE: &str = "values.yaml";
/// Template directory.
pub const TEMPLATES_DIR: &str = "templates";
/// Last-applied lifecycle state.
pub const RUNNING_CONFIG_DIR: &str = "running_config";
/// Nested sub-projects.
pub const DEPENDENCIES_DIR: &str = "dependencies";
/// Persisted directory digest.
pub const CHECKSUM_FILE: &str = "CHECKSUM";

/// A required member of a project directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProjectMember {
    /// `values.yaml`
    Values,
    /// `templates/`
    Templates,
    /// `running_config/`
    RunningConfig,
    /// `dependencies/`
    Dependencies,
}

impl ProjectMember {
    /// Every required member, in the order they are checked and reported.
    pub const ALL: [ProjectMember; 4] =
        [Self::Values, Self::Templates, Self::RunningConfig, Self::Dependencies];

    /// File or directory name of the member inside a project.
    #[must_use]
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Values => VALUES_FILE,
            Self::Templates => TEMPLATES_DIR,
            Self::RunningConfig => RUNNING_CONFIG_DIR,
            Self::Dependencies => DEPENDENCIES_DIR,
        }
    }

    /// Whether the member is a directory.
    #[must_use]
    pub fn is_dir(&self) -> bool {
        !matches!(self, Self::Values)
    }

    /// Message prefix reported when the member is absent; the project path follows it.
    #[must_use]
    pub fn missing_message(&self) -> &'static str {
        match self {
            Self::Values => "can't find values.yaml inside direcotry: ",
            Self::Templates => "can't find templates direcotry inside direcotry: ",
            Self::RunningConfig => "can't find running_config direcotry inside direcotry: ",
            Self::Dependencies => "can't find dependencies direcotry inside direcotry: ",
        }
    }
}

impl fmt::Display for ProjectMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file_name())
    }
}

/// Handle on a project directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    root: PathBuf,
}

impl Project {
    /// Create a handle without touching the filesystem.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Project root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Project name: the final component of the root path.
    pub fn name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "project".to_string())
    }

    pub fn member(&self, member: ProjectMember) -> PathBuf {
        self.root.join(member.file_name())
    }

    pub fn values_file(&self) -> PathBuf {
        self.member(ProjectMember::Values)
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.member(ProjectMember::Templates)
    }

    pub fn running_config_dir(&self) -> PathBuf {
        self.member(ProjectMember::RunningConfig)
    }

    pub fn dependencies_dir(&self) -> PathBuf {
        self.member(ProjectMember::Dependencies)
    }

    pub fn checksum_file(&self) -> PathBuf {
        self.root.join(CHECKSUM_FILE)
    }
}

/// A validated project together with its validated dependencies.
#[derive(Debug, Clone)]
pub struct ProjectTree {
    /// Name used to scope values and namespace output.
    pub name: String,
    pub project: Project,
    /// Direct dependencies, sorted by name.
    pub dependencies: Vec<ProjectTree>,
}

impl ProjectTree {
    /// Validate `root` and every project nested under its `dependencies/`.
    ///
    /// Fails with the aggregated structural error of the first invalid
    /// project, or with `DependencyCycle` when a dependency resolves (through
    /// symlinks) to one of its own ancestors.
    #[instrument]
    pub fn load(root: &Path) -> Result<Self> {
        let project = Project::new(root);
        let mut ancestors = Vec::new();
        Self::load_node(project.name(), project, &mut ancestors)
    }

    fn load_node(
        name: String,
        project: Project,
        ancestors: &mut Vec<(String, PathBuf)>,
    ) -> Result<Self> {
        validate::validate(project.root())?;

        let canonical = project
            .root()
            .canonicalize()
            .map_err(|e| DcpmError::io(project.root(), e))?;

        if let Some(pos) = ancestors.iter().position(|(_, path)| *path == canonical) {
            let mut cycle: Vec<String> =
                ancestors[pos..].iter().map(|(name, _)| name.clone()).collect();
            cycle.push(name);
            return Err(DcpmError::DependencyCycle { cycle });
        }

        ancestors.push((name.clone(), canonical));

        let mut dependencies = Vec::new();
        for (dep_name, dep_root) in dependency_dirs(&project.dependencies_dir())? {
            debug!(project = %name, dependency = %dep_name, "Loading dependency");
            dependencies.push(Self::load_node(dep_name, Project::new(dep_root), ancestors)?);
        }

        ancestors.pop();

        Ok(Self { name, project, dependencies })
    }

    /// Number of projects in the tree, including the root.
    pub fn project_count(&self) -> usize {
        1 + self.dependencies.iter().map(ProjectTree::project_count).sum::<usize>()
    }
}

/// Directories directly under `dir`, sorted by name. Plain files are skipped.
fn dependency_dirs(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut dirs = Vec::new();

    for entry in std::fs::read_dir(dir).map_err(|e| DcpmError::io(dir, e))? {
        let entry = entry.map_err(|e| DcpmError::io(dir, e))?;
        let path = entry.path();
        if !path.is_dir() {
            debug!(path = %path.display(), "Skipping non-directory entry in dependencies");
            continue;
        }
        dirs.push((entry.file_name().to_string_lossy().to_string(), path));
    }

    dirs.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(dirs)
}
