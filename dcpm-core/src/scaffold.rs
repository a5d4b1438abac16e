//! New project skeletons.

use crate::error::{DcpmError, Result};
use crate::project::{Project, ProjectMember};
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// Create an empty project at `target`.
///
/// The result is exactly an empty `values.yaml` plus empty `templates/`,
/// `running_config/` and `dependencies/` directories. `target` may already
/// exist as long as it is an empty directory. If anything fails midway, a
/// directory created by this call is removed again.
#[instrument]
pub fn init(target: &Path) -> Result<PathBuf> {
    let created = prepare_target(target)?;

    if let Err(e) = create_members(&Project::new(target)) {
        if created {
            if let Err(cleanup) = std::fs::remove_dir_all(target) {
                warn!(error = %cleanup, "Failed to remove partially created project");
            }
        }
        return Err(e);
    }

    info!("Created project");
    Ok(target.to_path_buf())
}

/// Make sure `target` is an empty directory. Returns whether it was created.
fn prepare_target(target: &Path) -> Result<bool> {
    if !target.exists() {
        std::fs::create_dir_all(target).map_err(|e| DcpmError::io(target, e))?;
        return Ok(true);
    }

    let is_empty_dir = target.is_dir()
        && std::fs::read_dir(target).map_err(|e| DcpmError::io(target, e))?.next().is_none();
    if is_empty_dir {
        Ok(false)
    } else {
        Err(DcpmError::TargetNotEmpty { path: target.to_path_buf() })
    }
}

fn create_members(project: &Project) -> Result<()> {
    for member in ProjectMember::ALL {
        let path = project.member(member);
        if member.is_dir() {
            std::fs::create_dir(&path).map_err(|e| DcpmError::io(&path, e))?;
        } else {
            std::fs::File::create(&path).map_err(|e| DcpmError::io(&path, e))?;
        }
    }
    Ok(())
}
