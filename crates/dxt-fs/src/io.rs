//! Directory moves and cleanup
//!
//! Primary operations return [`Result`] and are fatal to the caller.
//! Cleanup helpers return a [`CleanupOutcome`] instead, which is logged and
//! never propagated.

use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use crate::{Error, Result};

/// Outcome of an advisory, best-effort cleanup.
#[derive(Debug)]
pub enum CleanupOutcome {
    /// The path existed and was removed.
    Removed,
    /// Nothing was there to remove.
    Absent,
    /// Removal failed; the error is reported but not propagated.
    Failed(std::io::Error),
}

impl CleanupOutcome {
    /// Emit a log line describing this outcome for `path`.
    pub fn log(&self, what: &str, path: &Path) {
        match self {
            Self::Removed => tracing::debug!(path = %path.display(), "removed {what}"),
            Self::Absent => tracing::trace!(path = %path.display(), "{what} already absent"),
            Self::Failed(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove {what}")
            }
        }
    }

    pub fn is_removed(&self) -> bool {
        matches!(self, Self::Removed)
    }
}

/// Recursively remove a directory (or file) without failing the caller.
pub fn remove_best_effort(path: &Path) -> CleanupOutcome {
    let metadata = match fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return CleanupOutcome::Absent,
        Err(e) => return CleanupOutcome::Failed(e),
    };

    let result = if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };

    match result {
        Ok(()) => CleanupOutcome::Removed,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => CleanupOutcome::Absent,
        Err(e) => CleanupOutcome::Failed(e),
    }
}

/// Recursively remove a directory, failing on any I/O error.
///
/// Returns `Ok(false)` when the path did not exist.
pub fn remove_dir(path: &Path) -> Result<bool> {
    match remove_best_effort(path) {
        CleanupOutcome::Removed => Ok(true),
        CleanupOutcome::Absent => Ok(false),
        CleanupOutcome::Failed(e) => Err(Error::io(path, e)),
    }
}

/// Move a directory tree from `src` to `dst`.
///
/// Tries an atomic rename first. When that fails (typically because the two
/// paths live on different filesystems), the tree is copied and the source
/// removed afterwards. `dst` must not exist.
pub fn move_dir(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    match fs::rename(src, dst) {
        Ok(()) => return Ok(()),
        Err(e) => {
            tracing::debug!(
                src = %src.display(),
                dst = %dst.display(),
                error = %e,
                "rename failed, falling back to copy"
            );
        }
    }

    copy_dir_all(src, dst)?;
    remove_best_effort(src).log("moved source", src);
    Ok(())
}

/// Recursively copy the contents of `src` into `dst`.
///
/// Symbolic links are not followed and not recreated.
pub fn copy_dir_all(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst).map_err(|e| Error::io(dst, e))?;

    for entry in WalkDir::new(src).follow_links(false).min_depth(1) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(src).to_path_buf();
            Error::io(path, e.into())
        })?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|_| Error::traversal(entry.path().display()))?;
        let target = dst.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(|e| Error::io(&target, e))?;
        } else if file_type.is_file() {
            fs::copy(entry.path(), &target).map_err(|e| Error::io(&target, e))?;
        } else {
            tracing::warn!(path = %entry.path().display(), "skipping non-regular file during copy");
        }
    }

    Ok(())
}
