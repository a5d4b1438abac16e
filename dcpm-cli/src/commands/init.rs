//! `dcpm init`

use anyhow::Result;
use colored::Colorize;
use dcpm_core::scaffold;
use std::path::Path;

/// Create an empty project at `path`.
pub fn init(path: &Path) -> Result<()> {
    let created = scaffold::init(path)?;
    println!("{} Created project {}", "✓".green().bold(), created.display().to_string().bold());
    Ok(())
}
