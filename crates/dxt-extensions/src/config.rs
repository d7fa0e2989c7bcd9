//! Installer configuration: the fixed roots and extraction limits.
//!
//! ```toml
//! temp_root = "/var/tmp"
//! extensions_root = "/srv/app/extensions"
//!
//! [limits]
//! max_extracted_bytes = 268435456
//! max_entries = 5000
//! ```
//!
//! Keys that are left out fall back to [`InstallerConfig::default_locations`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::archive::ExtractionLimits;
use crate::error::{Error, Result};

/// Directory under the temp root that holds in-flight extractions.
pub const UPLOADS_DIR: &str = "dxt_uploads";

/// Application directory name under the platform data directory.
const APP_DIR: &str = "dxt-installer";

/// Roots and limits for an [`InstallationManager`](crate::InstallationManager).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallerConfig {
    /// Root for scratch extraction; uploads go to `<temp_root>/dxt_uploads`.
    pub temp_root: PathBuf,
    /// Managed directory holding one `server-<name>` child per extension.
    pub extensions_root: PathBuf,
    #[serde(default)]
    pub limits: ExtractionLimits,
}

/// On-disk form, where every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    temp_root: Option<PathBuf>,
    extensions_root: Option<PathBuf>,
    limits: Option<ExtractionLimits>,
}

impl InstallerConfig {
    pub fn new(temp_root: impl Into<PathBuf>, extensions_root: impl Into<PathBuf>) -> Self {
        Self {
            temp_root: temp_root.into(),
            extensions_root: extensions_root.into(),
            limits: ExtractionLimits::default(),
        }
    }

    /// Platform defaults:
    ///
    /// - temp root: the system temp directory
    /// - extensions root: `<data_dir>/dxt-installer/extensions`
    ///   (`~/.local/share` on Linux, `~/Library/Application Support` on macOS,
    ///   `%APPDATA%` on Windows)
    pub fn default_locations() -> Self {
        let data_dir = dirs::data_dir().unwrap_or_else(std::env::temp_dir);
        Self::new(
            std::env::temp_dir(),
            data_dir.join(APP_DIR).join("extensions"),
        )
    }

    pub fn with_limits(mut self, limits: ExtractionLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Directory holding scratch extractions.
    pub fn uploads_dir(&self) -> PathBuf {
        self.temp_root.join(UPLOADS_DIR)
    }

    /// Parse a TOML config, filling gaps from the platform defaults.
    pub fn from_toml(content: &str) -> Result<Self> {
        Self::parse(content, Path::new("<inline>"))
    }

    /// Load a TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::ConfigParse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        tracing::debug!(path = %path.display(), "loading installer config");
        Self::parse(&content, path)
    }

    fn parse(content: &str, path: &Path) -> Result<Self> {
        let file: ConfigFile = toml::from_str(content).map_err(|e| Error::ConfigParse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut config = Self::default_locations();
        if let Some(temp_root) = file.temp_root {
            config.temp_root = temp_root;
        }
        if let Some(extensions_root) = file.extensions_root {
            config.extensions_root = extensions_root;
        }
        if let Some(limits) = file.limits {
            config.limits = limits;
        }
        Ok(config)
    }

    /// Apply explicit overrides, e.g. from command-line flags.
    pub fn with_overrides(
        mut self,
        temp_root: Option<PathBuf>,
        extensions_root: Option<PathBuf>,
    ) -> Self {
        if let Some(temp_root) = temp_root {
            self.temp_root = temp_root;
        }
        if let Some(extensions_root) = extensions_root {
            self.extensions_root = extensions_root;
        }
        self
    }
}
