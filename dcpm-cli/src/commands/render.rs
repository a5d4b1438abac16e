//! `dcpm render`

use anyhow::Result;
use dcpm_core::Renderer;
use std::path::{Path, PathBuf};
use tracing::info;

/// Render `project` into `output`. Prints nothing on success.
pub fn render(project: &Path, output: &Path, values: Option<PathBuf>) -> Result<()> {
    let renderer = Renderer::load(project, values.as_deref())?;
    let rendered = renderer.render_to(output)?;
    info!(files = rendered.len(), output = %output.display(), "Render complete");
    Ok(())
}
