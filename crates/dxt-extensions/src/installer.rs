//! Installation lifecycle for extension packages.
//!
//! An install moves through four states, each logged at `debug` together
//! with the scratch id:
//!
//! ```text
//! Extracting -> ManifestChecking -> Placing -> Done
//!      \               \               \
//!       +---------------+---------------+--> RolledBack
//! ```
//!
//! Extraction happens in `<temp_root>/dxt_uploads/<uuid>`. Nothing under the
//! extensions root is touched until the manifest has been validated. A
//! reinstall deletes the previous `server-<name>` directory before moving the
//! new tree into place; a crash between those two steps can leave the entry
//! missing or partially populated.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use uuid::Uuid;

use dxt_fs::CleanupOutcome;
use dxt_fs::io::{move_dir, remove_best_effort, remove_dir};

use crate::UserConfig;
use crate::config::InstallerConfig;
use crate::error::Result;
use crate::manifest::ExtensionManifest;
use crate::platform::{self, Platform, ResolvedLaunchConfig};

/// Result of a successful install.
#[derive(Debug, Clone, PartialEq)]
pub struct InstallOutcome {
    pub manifest: ExtensionManifest,
    /// Absolute path of the `server-<name>` directory.
    pub install_dir: PathBuf,
}

/// An extension found under the extensions root.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstalledExtension {
    pub manifest: ExtensionManifest,
    pub install_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InstallState {
    Extracting,
    ManifestChecking,
    Placing,
    Done,
    RolledBack,
}

impl fmt::Display for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Extracting => "extracting",
            Self::ManifestChecking => "manifest-checking",
            Self::Placing => "placing",
            Self::Done => "done",
            Self::RolledBack => "rolled-back",
        };
        f.write_str(name)
    }
}

fn enter(scratch_id: &Uuid, state: InstallState) {
    tracing::debug!(scratch = %scratch_id, %state, "install state");
}

/// Installs, resolves and removes extensions under a managed root.
///
/// Installs and uninstalls of the same extension name are serialized within
/// this manager. Processes sharing an extensions root must coordinate
/// themselves.
#[derive(Debug)]
pub struct InstallationManager {
    config: InstallerConfig,
    name_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl InstallationManager {
    pub fn new(config: InstallerConfig) -> Self {
        Self {
            config,
            name_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &InstallerConfig {
        &self.config
    }

    /// Install the extension archive at `archive`.
    ///
    /// On failure the scratch directory is removed and the error is
    /// returned unchanged. On success the archive itself is deleted when it
    /// sits inside the uploads directory.
    pub fn install(&self, archive: &Path) -> Result<InstallOutcome> {
        let scratch_id = Uuid::new_v4();
        let scratch = self.config.uploads_dir().join(scratch_id.to_string());

        match self.install_from(archive, &scratch, &scratch_id) {
            Ok(outcome) => {
                enter(&scratch_id, InstallState::Done);
                if self.is_upload(archive) {
                    remove_best_effort(archive).log("uploaded archive", archive);
                }
                tracing::info!(
                    name = %outcome.manifest.name,
                    version = %outcome.manifest.version,
                    path = %outcome.install_dir.display(),
                    "installed extension"
                );
                Ok(outcome)
            }
            Err(e) => {
                enter(&scratch_id, InstallState::RolledBack);
                tracing::debug!(archive = %archive.display(), error = %e, "install failed");
                remove_best_effort(&scratch).log("scratch directory", &scratch);
                Err(e)
            }
        }
    }

    fn install_from(
        &self,
        archive: &Path,
        scratch: &Path,
        scratch_id: &Uuid,
    ) -> Result<InstallOutcome> {
        enter(scratch_id, InstallState::Extracting);
        crate::archive::extract(archive, scratch, &self.config.limits)?;

        enter(scratch_id, InstallState::ManifestChecking);
        let manifest = ExtensionManifest::from_dir(scratch)?;
        let host = Platform::current();
        if !manifest.supports_platform(host) {
            tracing::warn!(
                name = %manifest.name,
                platform = %host,
                "extension does not declare support for this platform"
            );
        }

        enter(scratch_id, InstallState::Placing);
        fs::create_dir_all(&self.config.extensions_root)
            .map_err(|e| dxt_fs::Error::io(&self.config.extensions_root, e))?;
        let install_dir = self.install_dir_for(&manifest.name)?;

        self.with_name_lock(&manifest.name, || -> Result<()> {
            if remove_dir(&install_dir)? {
                tracing::debug!(path = %install_dir.display(), "replaced previous installation");
            }
            move_dir(scratch, &install_dir)?;
            Ok(())
        })?;

        Ok(InstallOutcome {
            manifest,
            install_dir,
        })
    }

    /// The confined `server-<name>` directory for `name`.
    ///
    /// Fails with a path-traversal error when the name would place the
    /// directory anywhere but directly under the extensions root.
    pub fn install_dir_for(&self, name: &str) -> Result<PathBuf> {
        let root = &self.config.extensions_root;
        let target = root.join(format!("{}{name}", crate::INSTALL_DIR_PREFIX));
        Ok(dxt_fs::confine(root, target)?)
    }

    /// Resolve the launch configuration of an installed extension.
    pub fn launch_config(
        &self,
        installed_dir: &Path,
        user_config: Option<&UserConfig>,
    ) -> Result<ResolvedLaunchConfig> {
        let manifest = ExtensionManifest::from_dir(installed_dir)?;
        platform::resolve(&manifest.server.mcp_config, installed_dir, user_config)
    }

    /// Like [`launch_config`](Self::launch_config), but any failure is
    /// logged and reported as `None`.
    pub fn resolve_config(
        &self,
        installed_dir: &Path,
        user_config: Option<&UserConfig>,
    ) -> Option<ResolvedLaunchConfig> {
        match self.launch_config(installed_dir, user_config) {
            Ok(resolved) => Some(resolved),
            Err(e) => {
                tracing::warn!(
                    path = %installed_dir.display(),
                    error = %e,
                    "could not resolve launch configuration"
                );
                None
            }
        }
    }

    /// Resolve the launch configuration of the extension installed as `name`.
    pub fn resolve_installed(
        &self,
        name: &str,
        user_config: Option<&UserConfig>,
    ) -> Option<ResolvedLaunchConfig> {
        match self.install_dir_for(name) {
            Ok(dir) => self.resolve_config(&dir, user_config),
            Err(e) => {
                tracing::warn!(%name, error = %e, "rejected extension name");
                None
            }
        }
    }

    /// Remove the extension installed as `name`.
    ///
    /// Returns whether anything was removed. Errors are logged, never
    /// returned.
    pub fn uninstall(&self, name: &str) -> bool {
        let install_dir = match self.install_dir_for(name) {
            Ok(dir) => dir,
            Err(e) => {
                tracing::warn!(%name, error = %e, "refusing to uninstall");
                return false;
            }
        };

        self.with_name_lock(name, || {
            let outcome = remove_best_effort(&install_dir);
            outcome.log("extension directory", &install_dir);
            if outcome.is_removed() {
                tracing::info!(%name, path = %install_dir.display(), "uninstalled extension");
            }
            outcome.is_removed()
        })
    }

    /// Remove the whole uploads directory, including scratch residue left
    /// by crashed installs.
    pub fn purge_temp(&self) -> CleanupOutcome {
        let uploads = self.config.uploads_dir();
        let outcome = remove_best_effort(&uploads);
        outcome.log("uploads directory", &uploads);
        outcome
    }

    /// Every `server-*` directory under the extensions root with a readable,
    /// valid manifest, sorted by name.
    pub fn list_installed(&self) -> Result<Vec<InstalledExtension>> {
        let root = &self.config.extensions_root;
        let entries = match fs::read_dir(root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(dxt_fs::Error::io(root, e).into()),
        };

        let mut installed = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| dxt_fs::Error::io(root, e))?;
            let dir_name = entry.file_name().to_string_lossy().into_owned();
            if !dir_name.starts_with(crate::INSTALL_DIR_PREFIX) {
                continue;
            }
            if !entry.file_type().is_ok_and(|t| t.is_dir()) {
                continue;
            }

            let install_dir = entry.path();
            let manifest = match ExtensionManifest::from_dir(&install_dir) {
                Ok(manifest) => manifest,
                Err(e) => {
                    tracing::warn!(path = %install_dir.display(), error = %e, "skipping unreadable extension");
                    continue;
                }
            };
            if manifest.install_dir_name() != dir_name {
                tracing::warn!(
                    path = %install_dir.display(),
                    name = %manifest.name,
                    "skipping extension whose manifest name does not match its directory"
                );
                continue;
            }

            installed.push(InstalledExtension {
                manifest,
                install_dir,
            });
        }

        installed.sort_by(|a, b| a.manifest.name.cmp(&b.manifest.name));
        Ok(installed)
    }

    fn name_lock(&self, name: &str) -> Arc<Mutex<()>> {
        let mut locks = self
            .name_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(name.to_string()).or_default())
    }

    /// Run `f` while holding the lock for `name`.
    ///
    /// The map entry is dropped afterwards unless another caller still
    /// holds a handle to it.
    fn with_name_lock<T>(&self, name: &str, f: impl FnOnce() -> T) -> T {
        let lock = self.name_lock(name);
        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };

        let mut locks = self
            .name_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        drop(lock);
        if locks.get(name).is_some_and(|entry| Arc::strong_count(entry) == 1) {
            locks.remove(name);
        }
        result
    }

    fn is_upload(&self, archive: &Path) -> bool {
        match (
            dxt_fs::normalize_absolute(archive),
            dxt_fs::normalize_absolute(self.config.uploads_dir()),
        ) {
            (Ok(archive), Ok(uploads)) => archive.starts_with(&uploads) && archive != uploads,
            _ => false,
        }
    }
}
