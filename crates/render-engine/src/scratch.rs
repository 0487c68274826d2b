//! Per-render scratch directories.

use std::path::Path;

use tempfile::TempDir;

use clipburn_common::error::{ClipError, ClipResult};

/// Temporary working directory owned by exactly one render.
///
/// The directory and everything staged in it are removed when the value is
/// dropped, whether the render succeeded, failed, or was cancelled. Removal
/// failures are logged and never replace the render's own outcome.
#[derive(Debug)]
pub struct ScratchDir {
    dir: Option<TempDir>,
}

impl ScratchDir {
    /// Create a fresh directory under `root`, or the system temp dir.
    pub fn create(root: Option<&Path>) -> ClipResult<Self> {
        let prefix = format!(
            "clipburn-{}-",
            chrono::Utc::now().format("%Y%m%dT%H%M%S")
        );
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);

        let dir = match root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        }
        .map_err(|e| ClipError::config(format!("Failed to create scratch directory: {e}")))?;

        tracing::debug!(path = %dir.path().display(), "Created scratch directory");
        Ok(Self { dir: Some(dir) })
    }

    pub fn path(&self) -> &Path {
        match &self.dir {
            Some(dir) => dir.path(),
            None => Path::new(""),
        }
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        let path = dir.path().to_path_buf();
        match dir.close() {
            Ok(()) => tracing::debug!(path = %path.display(), "Removed scratch directory"),
            Err(err) => tracing::warn!(
                path = %path.display(),
                error = %err,
                "Failed to remove scratch directory"
            ),
        }
    }
}
