//! Structural validation of project directories.

use crate::error::{DcpmError, Result};
use crate::project::{Project, ProjectMember};
use std::path::Path;
use tracing::debug;

/// Check that `path` is a project directory with every required member.
///
/// All members are checked before failing so a broken project can be fixed
/// in one pass: the returned `StructuralValidation` error lists every
/// missing member, in `ProjectMember::ALL` order.
pub fn validate(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(DcpmError::ProjectNotFound { path: path.to_path_buf() });
    }

    let missing = missing_members(path);
    if missing.is_empty() {
        debug!(project = %path.display(), "Project structure is valid");
        Ok(())
    } else {
        Err(DcpmError::StructuralValidation { project: path.to_path_buf(), missing })
    }
}

/// Required members absent from `path`.
pub fn missing_members(path: &Path) -> Vec<ProjectMember> {
    let project = Project::new(path);
    ProjectMember::ALL.into_iter().filter(|member| !project.member(*member).exists()).collect()
}
