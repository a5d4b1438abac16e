//! `dcpm checksum create|check`

use anyhow::Result;
use dcpm_core::checksum;
use std::io::{self, Write};
use std::path::Path;
use tracing::debug;

/// Write the project checksum to its CHECKSUM file.
pub async fn create(project: &Path) -> Result<()> {
    let digest = checksum::create(project).await?;
    debug!(digest = %digest, "Checksum created");
    Ok(())
}

/// Verify the project against its CHECKSUM file.
///
/// Success prints exactly `checksum is correct`, without a trailing newline.
pub async fn check(project: &Path) -> Result<()> {
    checksum::check(project).await?;

    let mut stdout = io::stdout();
    write!(stdout, "checksum is correct")?;
    stdout.flush()?;
    Ok(())
}
