//! Extension package installer.
//!
//! This crate validates extension manifests, extracts extension archives,
//! installs them under a managed root, and resolves their launch
//! configuration for the host platform.

pub mod archive;
pub mod config;
pub mod error;
pub mod installer;
pub mod manifest;
pub mod platform;
pub mod substitute;

/// The manifest file every extension archive carries at its root.
pub const MANIFEST_FILENAME: &str = "manifest.json";

/// Installed extensions live in `<extensions_root>/server-<name>`.
pub const INSTALL_DIR_PREFIX: &str = "server-";

/// User-supplied configuration values, keyed by `user_config` field name.
pub type UserConfig = serde_json::Map<String, serde_json::Value>;

pub use archive::{ExtractionLimits, ExtractionSummary, extract, read_manifest};
pub use config::{InstallerConfig, UPLOADS_DIR};
pub use dxt_fs::CleanupOutcome;
pub use error::{Error, ErrorKind, Result};
pub use installer::{InstallOutcome, InstallationManager, InstalledExtension};
pub use manifest::{ExtensionManifest, LaunchConfig, PartialLaunchConfig, ServerConfig, validate};
pub use platform::{Platform, ResolvedLaunchConfig};
pub use substitute::{SubstitutionContext, substitute};
