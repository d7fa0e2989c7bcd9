//! Extension archive extraction.
//!
//! Entry names are resolved through [`zip::read::ZipFile::enclosed_name`],
//! which refuses absolute paths and `..` components. Each output path is
//! checked again against the destination before anything is written, and
//! symbolic-link entries are never materialized.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use zip::ZipArchive;

use crate::error::{Error, Result};

const S_IFMT: u32 = 0o170_000;
const S_IFLNK: u32 = 0o120_000;

/// Bounds applied while extracting an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionLimits {
    /// Maximum total bytes written across all entries.
    pub max_extracted_bytes: u64,
    /// Maximum number of entries the archive may contain.
    pub max_entries: usize,
}

impl Default for ExtractionLimits {
    fn default() -> Self {
        Self {
            max_extracted_bytes: 512 * 1024 * 1024,
            max_entries: 10_000,
        }
    }
}

/// What an extraction wrote to disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionSummary {
    pub files: usize,
    pub directories: usize,
    pub bytes: u64,
    /// Entries that were deliberately not written (symbolic links).
    pub skipped: usize,
}

/// Extract `archive` into `dest`, creating `dest` if needed.
pub fn extract(archive: &Path, dest: &Path, limits: &ExtractionLimits) -> Result<ExtractionSummary> {
    let file = match File::open(archive) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(Error::ArchiveNotFound(archive.to_path_buf()));
        }
        Err(e) => return Err(Error::extraction(archive, e)),
    };

    let mut zip = ZipArchive::new(file).map_err(|e| Error::extraction(archive, e))?;
    if zip.len() > limits.max_entries {
        return Err(Error::extraction(
            archive,
            format!(
                "archive has {} entries, limit is {}",
                zip.len(),
                limits.max_entries
            ),
        ));
    }

    fs::create_dir_all(dest).map_err(|e| Error::extraction(archive, e))?;
    let root = dxt_fs::normalize_absolute(dest)?;

    let mut summary = ExtractionSummary::default();
    for index in 0..zip.len() {
        let mut entry = zip
            .by_index(index)
            .map_err(|e| Error::extraction(archive, e))?;
        let name = entry.name().to_string();
        let out = entry_path(&root, &name, entry.enclosed_name().map(|p| p.to_path_buf()))
            .ok_or_else(|| {
                Error::extraction(archive, format!("entry '{name}' escapes the destination"))
            })?;

        if entry.unix_mode().is_some_and(|mode| mode & S_IFMT == S_IFLNK) {
            tracing::warn!(entry = %name, "skipping symbolic link in extension archive");
            summary.skipped += 1;
            continue;
        }

        if entry.is_dir() {
            fs::create_dir_all(&out).map_err(|e| Error::extraction(archive, e))?;
            summary.directories += 1;
            continue;
        }

        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::extraction(archive, e))?;
        }

        let budget = limits.max_extracted_bytes.saturating_sub(summary.bytes);
        let mut out_file = File::create(&out).map_err(|e| Error::extraction(archive, e))?;
        let written = io::copy(&mut (&mut entry).take(budget.saturating_add(1)), &mut out_file)
            .map_err(|e| Error::extraction(archive, format!("{name}: {e}")))?;
        if written > budget {
            return Err(Error::extraction(
                archive,
                format!(
                    "uncompressed size exceeds limit of {} bytes",
                    limits.max_extracted_bytes
                ),
            ));
        }
        summary.bytes += written;
        summary.files += 1;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode().filter(|mode| mode & 0o777 != 0) {
            use std::os::unix::fs::PermissionsExt;
            // Owner keeps read/write so the installer can move and remove it.
            let perms = fs::Permissions::from_mode((mode & 0o777) | 0o600);
            fs::set_permissions(&out, perms).map_err(|e| Error::extraction(archive, e))?;
        }
    }

    tracing::debug!(
        archive = %archive.display(),
        files = summary.files,
        bytes = summary.bytes,
        "extracted extension archive"
    );
    Ok(summary)
}

/// Read the raw `manifest.json` from an extracted extension directory.
pub fn read_manifest(dir: &Path) -> Result<String> {
    let path = dir.join(crate::MANIFEST_FILENAME);
    match fs::read_to_string(&path) {
        Ok(raw) => Ok(raw),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::ManifestParse {
            reason: format!("{} not found in {}", crate::MANIFEST_FILENAME, dir.display()),
        }),
        Err(e) => Err(dxt_fs::Error::io(path, e).into()),
    }
}

/// Output path for an entry, or `None` if it would land outside `root`.
fn entry_path(root: &Path, name: &str, enclosed: Option<PathBuf>) -> Option<PathBuf> {
    let relative = enclosed?;
    if name.contains('\0') {
        return None;
    }
    let out = dxt_fs::path::normalize_lexically(&root.join(relative));
    (out.starts_with(root) && out != root).then_some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_path_inside_root() {
        let root = Path::new("/scratch/abc");
        assert_eq!(
            entry_path(root, "bin/server", Some(PathBuf::from("bin/server"))),
            Some(PathBuf::from("/scratch/abc/bin/server"))
        );
    }

    #[test]
    fn test_entry_path_rejects_unenclosed() {
        let root = Path::new("/scratch/abc");
        assert_eq!(entry_path(root, "../evil", None), None);
    }

    #[test]
    fn test_entry_path_rejects_root_itself() {
        let root = Path::new("/scratch/abc");
        assert_eq!(entry_path(root, "./", Some(PathBuf::from("."))), None);
    }

    #[test]
    fn test_default_limits() {
        let limits = ExtractionLimits::default();
        assert_eq!(limits.max_extracted_bytes, 536_870_912);
        assert_eq!(limits.max_entries, 10_000);
    }
}
