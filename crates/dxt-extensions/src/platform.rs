//! Launch configuration resolution with per-platform overrides.
//!
//! Resolution overlays the override for the host platform onto the base
//! config, expands placeholders, and only then validates the command and
//! arguments. Validating the expanded strings is what catches a traversal
//! smuggled in through a placeholder such as `${user_config.dir}`.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::UserConfig;
use crate::error::Result;
use crate::manifest::LaunchConfig;
use crate::substitute::{SubstitutionContext, substitute};

/// Host platform, keyed the way manifests name it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Darwin,
    Win32,
    Linux,
    /// Any other OS, carrying its `std::env::consts::OS` name.
    Other(&'static str),
}

impl Platform {
    /// The platform this process is running on.
    pub fn current() -> Self {
        Self::from_os(std::env::consts::OS)
    }

    fn from_os(os: &'static str) -> Self {
        match os {
            "macos" => Self::Darwin,
            "windows" => Self::Win32,
            "linux" => Self::Linux,
            other => Self::Other(other),
        }
    }

    /// Key used in `platform_overrides` and `compatibility.platforms`.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Darwin => "darwin",
            Self::Win32 => "win32",
            Self::Linux => "linux",
            Self::Other(os) => *os,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A launch configuration ready to hand to a process runner.
///
/// Every string has been expanded; `command` and `args` have passed
/// validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedLaunchConfig {
    pub command: String,
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<BTreeMap<String, String>>,
}

/// Resolve `base` for the host platform.
pub fn resolve(
    base: &LaunchConfig,
    extract_dir: &Path,
    user_config: Option<&UserConfig>,
) -> Result<ResolvedLaunchConfig> {
    resolve_for(Platform::current(), base, extract_dir, user_config)
}

/// Resolve `base` as it would be on `platform`.
pub fn resolve_for(
    platform: Platform,
    base: &LaunchConfig,
    extract_dir: &Path,
    user_config: Option<&UserConfig>,
) -> Result<ResolvedLaunchConfig> {
    let merged = merge_override(platform, base);

    let ctx = SubstitutionContext::new(extract_dir).with_user_config(user_config);
    let command = substitute(&merged.command, &ctx);
    let args: Vec<String> = merged.args.iter().map(|arg| substitute(arg, &ctx)).collect();
    let env = merged.env.map(|env| {
        env.into_iter()
            .map(|(key, value)| {
                let expanded = substitute(&value, &ctx);
                (key, expanded)
            })
            .collect()
    });

    let command = dxt_fs::validate_command(&command)?;
    let args = dxt_fs::validate_args(&args)?;

    Ok(ResolvedLaunchConfig { command, args, env })
}

/// Overlay the override for `platform` onto a copy of `base`.
///
/// `command` and `args` are replaced wholesale; `env` is merged per key with
/// the override winning.
fn merge_override(platform: Platform, base: &LaunchConfig) -> ResolvedLaunchConfig {
    let mut merged = ResolvedLaunchConfig {
        command: base.command.clone(),
        args: base.args.clone(),
        env: base.env.clone(),
    };

    let Some(over) = base
        .platform_overrides
        .as_ref()
        .and_then(|overrides| overrides.get(platform.key()))
    else {
        return merged;
    };

    tracing::debug!(%platform, "applying platform override");

    if let Some(command) = &over.command {
        merged.command = command.clone();
    }
    if let Some(args) = &over.args {
        merged.args = args.clone();
    }
    if let Some(env) = &over.env {
        merged
            .env
            .get_or_insert_with(BTreeMap::new)
            .extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    merged
}
