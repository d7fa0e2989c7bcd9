//! Extension manifest parsing and validation for `manifest.json` files.
//!
//! A manifest declares the extension's identity, its MCP server launch
//! configuration, and optional descriptive metadata. Validation runs on the
//! raw JSON first so that every missing required field can be reported,
//! then the document is deserialized into [`ExtensionManifest`]. Unknown
//! fields are ignored.
//!
//! # Example
//!
//! ```json
//! {
//!   "dxt_version": "0.1",
//!   "name": "acme",
//!   "version": "1.2.0",
//!   "server": {
//!     "type": "node",
//!     "entry_point": "server/index.js",
//!     "mcp_config": {
//!       "command": "node",
//!       "args": ["${__dirname}/server/index.js"],
//!       "env": { "ACME_TOKEN": "${user_config.api_key}" },
//!       "platform_overrides": {
//!         "win32": { "command": "node.exe" }
//!       }
//!     }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::platform::Platform;

/// Longest accepted extension name, in bytes.
const MAX_NAME_LEN: usize = 128;

/// Characters no extension name may contain, on any platform.
const RESERVED_NAME_CHARS: &[char] = &['/', '\\', '<', '>', ':', '"', '|', '?', '*'];

/// Complete extension manifest loaded from `manifest.json`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ExtensionManifest {
    /// Manifest schema version. Older manifests spell the key
    /// `manifest_version`; [`validate`] folds it into this field.
    pub dxt_version: String,
    /// Extension name; the install directory is `server-<name>`.
    pub name: String,
    /// Extension version string.
    pub version: String,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub long_description: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub author: Option<Author>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub repository: Option<Repository>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub support: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Server runtime and launch configuration.
    pub server: ServerConfig,
    /// Tools the server declares up front.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Capability>,
    /// Prompts the server declares up front.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Vec::is_empty")]
    pub prompts: Vec<Capability>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    /// Schema of the values a user may supply at install time, keyed by
    /// the name used in `${user_config.<key>}` placeholders.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub user_config: Option<Map<String, Value>>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub compatibility: Option<Compatibility>,
}

/// Deserialize descriptive metadata, falling back to the default when the
/// value has an unexpected shape. Such fields never gate an install.
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "ignoring malformed manifest metadata");
        T::default()
    }))
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Author {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Repository {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
}

/// A tool or prompt declared by the manifest.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Capability {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Host and runtime constraints declared by the extension.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Compatibility {
    /// Platform keys (`darwin`, `win32`, `linux`) the extension supports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platforms: Option<Vec<String>>,
    /// Runtime version constraints, e.g. `{"node": ">=18"}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtimes: Option<BTreeMap<String, String>>,
    /// Any other constraints, kept for display.
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// The `server` section of a manifest.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Runtime type (e.g. "node", "python", "binary").
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub server_type: Option<String>,
    /// Entry point path relative to the extension directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_point: Option<String>,
    /// Base launch configuration.
    pub mcp_config: LaunchConfig,
}

/// Platform-neutral launch configuration, with optional per-platform
/// overrides.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct LaunchConfig {
    pub command: String,
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<BTreeMap<String, String>>,
    /// Overrides keyed by platform (`darwin`, `win32`, `linux`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_overrides: Option<BTreeMap<String, PartialLaunchConfig>>,
}

/// A per-platform override. Absent fields fall back to the base config.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct PartialLaunchConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<BTreeMap<String, String>>,
}

impl ExtensionManifest {
    /// Parse and validate a manifest from its raw JSON text.
    pub fn from_json(raw: &str) -> Result<Self> {
        validate(raw)
    }

    /// Read and validate `manifest.json` inside `dir`.
    ///
    /// A missing file is reported as [`Error::ManifestParse`].
    pub fn from_dir(dir: &Path) -> Result<Self> {
        validate(&crate::archive::read_manifest(dir)?)
    }

    /// Serialize the manifest back to pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::ManifestParse {
            reason: e.to_string(),
        })
    }

    /// Name of the directory this extension installs into.
    pub fn install_dir_name(&self) -> String {
        format!("{}{}", crate::INSTALL_DIR_PREFIX, self.name)
    }

    /// Display name if declared, otherwise the plain name.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }

    /// Whether the extension declares support for `platform`.
    ///
    /// Extensions that do not list platforms support all of them.
    pub fn supports_platform(&self, platform: Platform) -> bool {
        match self
            .compatibility
            .as_ref()
            .and_then(|c| c.platforms.as_ref())
        {
            Some(platforms) => platforms.iter().any(|p| p == platform.key()),
            None => true,
        }
    }
}

/// Validate raw manifest JSON and deserialize it.
///
/// Every required field is checked; a failure lists all that are missing
/// or have the wrong shape.
pub fn validate(raw: &str) -> Result<ExtensionManifest> {
    let mut value: Value = serde_json::from_str(raw).map_err(|e| Error::ManifestParse {
        reason: e.to_string(),
    })?;

    if !value.is_object() {
        return Err(Error::ManifestParse {
            reason: "manifest must be a JSON object at the top level".to_string(),
        });
    }

    let missing = missing_required_fields(&value);
    if !missing.is_empty() {
        return Err(Error::ManifestMissingField { fields: missing });
    }

    // Element types only; content checks run at launch resolution, after
    // placeholders are expanded.
    dxt_fs::guard::string_args(&value["server"]["mcp_config"]["args"])?;
    fold_schema_version(&mut value);

    let manifest: ExtensionManifest =
        serde_json::from_value(value).map_err(|e| Error::ManifestParse {
            reason: e.to_string(),
        })?;

    validate_name(&manifest.name)?;
    Ok(manifest)
}

/// Collapse the legacy `manifest_version` key into `dxt_version`.
///
/// A non-empty `dxt_version` wins; otherwise the legacy value is used.
fn fold_schema_version(value: &mut Value) {
    let Some(obj) = value.as_object_mut() else {
        return;
    };
    let Some(legacy) = obj.remove("manifest_version") else {
        return;
    };
    if !obj.get("dxt_version").is_some_and(is_non_blank) {
        obj.insert("dxt_version".to_string(), legacy);
    }
}

fn is_non_blank(value: &Value) -> bool {
    value.as_str().is_some_and(|s| !s.trim().is_empty())
}

fn missing_required_fields(value: &Value) -> Vec<String> {
    let mut missing = Vec::new();

    let has_schema_version = ["dxt_version", "manifest_version"]
        .iter()
        .any(|key| is_non_blank(&value[key]));
    if !has_schema_version {
        missing.push("dxt_version".to_string());
    }
    if !value["name"].is_string() {
        missing.push("name".to_string());
    }
    if !is_non_blank(&value["version"]) {
        missing.push("version".to_string());
    }

    let server = &value["server"];
    if !server.is_object() {
        missing.push("server".to_string());
    }
    let launch = &server["mcp_config"];
    if !launch.is_object() {
        missing.push("server.mcp_config".to_string());
    }
    if !launch["command"].is_string() {
        missing.push("server.mcp_config.command".to_string());
    }
    if !launch["args"].is_array() {
        missing.push("server.mcp_config.args".to_string());
    }

    missing
}

/// Check that an extension name is usable as a single directory component.
pub fn validate_name(name: &str) -> Result<()> {
    let reject = |reason: &str| {
        Err(Error::InvalidName {
            name: name.to_string(),
            reason: reason.to_string(),
        })
    };

    if name.trim().is_empty() {
        return reject("extension name must not be empty");
    }
    if name.len() > MAX_NAME_LEN {
        return reject("extension name is too long");
    }
    if name.chars().all(|c| c == '.') {
        return reject("extension name must not consist only of dots");
    }
    if name.chars().any(char::is_control) {
        return reject("extension name must not contain control characters");
    }
    if name.contains(RESERVED_NAME_CHARS) {
        return reject("extension name must not contain path separators or reserved characters");
    }
    if name != name.trim() || name.ends_with('.') {
        return reject("extension name must not begin or end with whitespace or end with a dot");
    }

    Ok(())
}
