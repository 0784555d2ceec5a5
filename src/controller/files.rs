//! Atomic replacement of manifest files edited in place.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

/// Replace `path` with `contents` through a temporary file in the same directory.
///
/// Readers see either the old or the new file, never a partial write.
pub fn write_atomically(path: &Path, contents: &str) -> Result<()> {
    let dir = path
        .parent()
        .with_context(|| format!("{} has no parent directory", path.display()))?;
    // Staged next to the target so the rename stays on one filesystem
    let mut staged = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
    staged
        .write_all(contents.as_bytes())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    staged
        .persist(path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}
