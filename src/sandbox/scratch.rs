use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

/// Scratch file holding the source of exactly one execution.
///
/// The file is created with a fresh UUID name (never a caller-supplied
/// path) and removed when the guard drops, on every exit path. Removal
/// is best-effort: a failure is logged and swallowed.
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    /// Creates `<dir>/sandbox-<uuid>.<extension>` and writes `contents`.
    ///
    /// The guard exists before the write happens, so a failed write
    /// still removes the partially written file.
    pub fn create(dir: &Path, extension: &str, contents: &str) -> Result<Self> {
        let path = dir.join(format!("sandbox-{}.{extension}", uuid::Uuid::new_v4()));

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .with_context(|| format!("creating scratch file {}", path.display()))?;
        let guard = Self { path };

        file.write_all(contents.as_bytes())
            .and_then(|_| file.flush())
            .with_context(|| format!("writing scratch file {}", guard.path.display()))?;

        debug!("Scratch file created: {}", guard.path.display());
        Ok(guard)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Scratch file removed: {}", self.path.display()),
            Err(e) => warn!(
                "Could not remove scratch file {}: {e}",
                self.path.display()
            ),
        }
    }
}
