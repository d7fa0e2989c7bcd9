//! Lexical path normalization
//!
//! Collapses `.` and `..` components without touching the filesystem, so a
//! containment check can run on the final shape of a path rather than on the
//! string it was built from.

use std::path::{Component, Path, PathBuf};

use crate::{Error, Result};

/// Normalize a path lexically.
///
/// `.` components are dropped and `..` pops the previous normal component.
/// On an absolute path, `..` at the root is a no-op; on a relative path a
/// leading `..` that has nothing to pop is preserved.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}

/// Make `path` absolute against the current directory and normalize it.
pub fn normalize_absolute(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let absolute = std::path::absolute(path).map_err(|e| Error::io(path, e))?;
    Ok(normalize_lexically(&absolute))
}

/// Resolve symbolic links for a path that exists, falling back to its
/// lexical form when it does not.
pub(crate) fn resolve_existing(path: &Path) -> PathBuf {
    match dunce::canonicalize(path) {
        Ok(canonical) => canonical,
        Err(_) => path.to_path_buf(),
    }
}
