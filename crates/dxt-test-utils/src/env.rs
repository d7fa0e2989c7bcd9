//! [`TestEnv`]: isolated installer roots for a single test.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A temporary directory laid out as
///
/// ```text
/// <root>/temp/               temp root (uploads under temp/dxt_uploads)
/// <root>/extensions/         extensions root
/// <root>/archives/           archives built by the test
/// ```
///
/// Only the directories are provided; callers build their own installer
/// configuration from [`temp_root`](Self::temp_root) and
/// [`extensions_root`](Self::extensions_root).
pub struct TestEnv {
    temp_dir: TempDir,
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn temp_root(&self) -> PathBuf {
        self.root().join("temp")
    }

    pub fn extensions_root(&self) -> PathBuf {
        self.root().join("extensions")
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.temp_root().join("dxt_uploads")
    }

    /// Path for an archive outside the temp root.
    pub fn archive_path(&self, file_name: &str) -> PathBuf {
        self.root().join("archives").join(file_name)
    }

    /// Path for an archive dropped into the uploads directory.
    pub fn upload_path(&self, file_name: &str) -> PathBuf {
        self.uploads_dir().join(file_name)
    }

    pub fn installed_dir(&self, name: &str) -> PathBuf {
        self.extensions_root().join(format!("server-{name}"))
    }

    /// Read a file from an installed extension.
    ///
    /// # Panics
    /// Panics if the file cannot be read.
    pub fn read_installed(&self, name: &str, file: &str) -> String {
        let path = self.installed_dir(name).join(file);
        fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("Could not read {}: {e}", path.display()))
    }

    /// Names of the entries directly under the extensions root, sorted.
    pub fn extensions_entries(&self) -> Vec<String> {
        entries(&self.extensions_root())
    }

    /// Assert that `server-<name>` exists and holds a manifest.
    pub fn assert_installed(&self, name: &str) {
        let manifest = self.installed_dir(name).join("manifest.json");
        assert!(
            manifest.is_file(),
            "Expected installed manifest: {}",
            manifest.display()
        );
    }

    pub fn assert_not_installed(&self, name: &str) {
        let dir = self.installed_dir(name);
        assert!(!dir.exists(), "Expected no installation at {}", dir.display());
    }

    /// Assert that no scratch directory was left in the uploads directory.
    ///
    /// Files (uploaded archives) are ignored.
    pub fn assert_no_scratch(&self) {
        let Ok(read) = fs::read_dir(self.uploads_dir()) else {
            return;
        };
        let leftovers: Vec<PathBuf> = read
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        assert!(leftovers.is_empty(), "Scratch residue: {leftovers:?}");
    }
}

fn entries(dir: &Path) -> Vec<String> {
    let Ok(read) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = read
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
