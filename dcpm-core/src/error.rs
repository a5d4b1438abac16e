//! Error types for dcpm.
//!
//! All errors use `thiserror` so callers get proper error chains. Several
//! messages are part of the CLI contract and are matched literally by
//! external tooling, so their wording (typos included) must not change.

use crate::project::ProjectMember;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for dcpm operations.
pub type Result<T> = std::result::Result<T, DcpmError>;

/// Main error type for dcpm.
#[derive(Error, Debug)]
pub enum DcpmError {
    // Project structure errors
    #[error("{}", missing_members(.project, .missing))]
    StructuralValidation { project: PathBuf, missing: Vec<ProjectMember> },

    #[error("direcotry doesn't exist: {}", .path.display())]
    ProjectNotFound { path: PathBuf },

    #[error("dependency cycle detected: {}", .cycle.join(" -> "))]
    DependencyCycle { cycle: Vec<String> },

    // Values errors
    #[error("failed to parse configuration file {}: {reason}", .path.display())]
    ConfigParse { path: PathBuf, reason: String },

    #[error("can't find a file: {}", .path.display())]
    ValuesFileNotFound { path: PathBuf },

    // Template errors
    #[error("missing value for key '{key}' in template {}", .template.display())]
    MissingValue { key: String, template: PathBuf },

    #[error("invalid template {}: {reason}", .template.display())]
    InvalidTemplate { template: PathBuf, reason: String },

    // Checksum errors
    #[error("can't find a direcory: {}", .path.display())]
    DirectoryNotFound { path: PathBuf },

    #[error("can't find a CHECKSUM file: {}", .path.display())]
    ChecksumFileNotFound { path: PathBuf },

    #[error("checksum doesn't match!")]
    ChecksumMismatch,

    // Lifecycle errors
    #[error("container engine failed to {operation}: {reason}")]
    ContainerEngine { operation: String, reason: String },

    #[error(
        "service '{service}' is defined in both {} and {}",
        .first.display(),
        .second.display()
    )]
    DuplicateService { service: String, first: PathBuf, second: PathBuf },

    #[error("rendered project {} does not define any compose services", .project.display())]
    NothingToInstall { project: PathBuf },

    #[error("invalid running configuration at {}: {reason}", .path.display())]
    InvalidRunningConfig { path: PathBuf, reason: String },

    // Scaffolding errors
    #[error("directory already exists: {}", .path.display())]
    TargetNotEmpty { path: PathBuf },

    // Configuration errors
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("{message}")]
    Usage { message: String },

    // File system errors
    #[error("I/O error at {}", .path.display())]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DcpmError {
    /// Wrap an I/O error together with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::IoError { path: path.into(), source }
    }
}

/// One line per missing project member.
fn missing_members(project: &Path, missing: &[ProjectMember]) -> String {
    missing
        .iter()
        .map(|member| format!("{}{}", member.missing_message(), project.display()))
        .collect::<Vec<_>>()
        .join("\n")
}
