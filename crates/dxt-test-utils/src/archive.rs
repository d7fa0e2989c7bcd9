//! [`ArchiveBuilder`] for extension package fixtures.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::{Value, json};
use zip::CompressionMethod;
use zip::write::{SimpleFileOptions, ZipWriter};

/// A minimal valid manifest for an extension called `name`.
///
/// The launch config runs `node ${__dirname}/server/index.js`.
pub fn sample_manifest(name: &str) -> Value {
    json!({
        "dxt_version": "0.1",
        "name": name,
        "version": "1.0.0",
        "description": format!("{name} test extension"),
        "server": {
            "type": "node",
            "entry_point": "server/index.js",
            "mcp_config": {
                "command": "node",
                "args": ["${__dirname}/server/index.js"],
                "env": { "EXT_NAME": name }
            }
        }
    })
}

#[derive(Debug, Clone)]
enum Entry {
    File {
        name: String,
        contents: Vec<u8>,
        mode: u32,
    },
    Dir {
        name: String,
    },
    Symlink {
        name: String,
        target: String,
    },
}

/// Builds zip archives shaped like extension packages.
///
/// Entry names are written exactly as given, so `../escape.txt` or
/// `/etc/passwd` end up in the archive verbatim.
///
/// # Example
///
/// ```rust,no_run
/// use dxt_test_utils::{ArchiveBuilder, sample_manifest};
///
/// let dir = tempfile::TempDir::new().unwrap();
/// let archive = ArchiveBuilder::new()
///     .manifest(&sample_manifest("acme"))
///     .file("server/index.js", "console.log('hi')")
///     .write_to(&dir.path().join("acme.dxt"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ArchiveBuilder {
    entries: Vec<Entry>,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Archive containing [`sample_manifest`] and a server entry point.
    pub fn extension(name: &str) -> Self {
        Self::new()
            .manifest(&sample_manifest(name))
            .file("server/index.js", format!("// {name}\n"))
    }

    /// Add `manifest.json` with `manifest` serialized as JSON.
    pub fn manifest(self, manifest: &Value) -> Self {
        self.file("manifest.json", manifest.to_string())
    }

    /// Add `manifest.json` with raw, possibly malformed, contents.
    pub fn raw_manifest(self, contents: &str) -> Self {
        self.file("manifest.json", contents)
    }

    pub fn file(self, name: &str, contents: impl AsRef<[u8]>) -> Self {
        self.file_with_mode(name, contents, 0o644)
    }

    pub fn executable(self, name: &str, contents: impl AsRef<[u8]>) -> Self {
        self.file_with_mode(name, contents, 0o755)
    }

    pub fn file_with_mode(mut self, name: &str, contents: impl AsRef<[u8]>, mode: u32) -> Self {
        self.entries.push(Entry::File {
            name: name.to_string(),
            contents: contents.as_ref().to_vec(),
            mode,
        });
        self
    }

    pub fn dir(mut self, name: &str) -> Self {
        self.entries.push(Entry::Dir {
            name: name.to_string(),
        });
        self
    }

    pub fn symlink(mut self, name: &str, target: &str) -> Self {
        self.entries.push(Entry::Symlink {
            name: name.to_string(),
            target: target.to_string(),
        });
        self
    }

    /// Write the archive to `path`, creating parent directories.
    ///
    /// # Panics
    /// Panics on any I/O or zip error.
    pub fn write_to(&self, path: &Path) -> PathBuf {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let file = File::create(path)
            .unwrap_or_else(|e| panic!("cannot create archive {}: {e}", path.display()));
        let mut zip = ZipWriter::new(file);
        let base = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for entry in &self.entries {
            match entry {
                Entry::File {
                    name,
                    contents,
                    mode,
                } => {
                    zip.start_file(name.as_str(), base.unix_permissions(*mode))
                        .unwrap();
                    zip.write_all(contents).unwrap();
                }
                Entry::Dir { name } => {
                    zip.add_directory(name.as_str(), base.unix_permissions(0o755))
                        .unwrap();
                }
                Entry::Symlink { name, target } => {
                    zip.add_symlink(name.as_str(), target.as_str(), base)
                        .unwrap();
                }
            }
        }

        zip.finish().unwrap();
        path.to_path_buf()
    }
}
