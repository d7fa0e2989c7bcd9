//! Placeholder expansion for launch configuration strings.
//!
//! # Placeholders
//!
//! | Placeholder              | Expands to                                   |
//! |--------------------------|----------------------------------------------|
//! | `${__dirname}`           | The extension's extraction/install directory |
//! | `${HOME}`                | The user's home directory                    |
//! | `${DESKTOP}`             | `<home>/Desktop`                             |
//! | `${DOCUMENTS}`           | `<home>/Documents`                           |
//! | `${DOWNLOADS}`           | `<home>/Downloads`                           |
//! | `${pathSeparator}`, `${/}` | The host path separator                    |
//! | `${user_config.<key>}`   | The user-supplied value for `<key>`          |
//!
//! Anything that cannot be resolved is left exactly as written, so an
//! unconfigured value stays visible instead of silently becoming empty.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::UserConfig;

const USER_CONFIG_PREFIX: &str = "user_config.";

/// Values available to [`substitute`].
#[derive(Debug, Clone)]
pub struct SubstitutionContext<'a> {
    /// Directory the extension was extracted or installed into.
    pub extract_dir: &'a Path,
    /// Home directory, if the host has one.
    pub home_dir: Option<PathBuf>,
    /// User-supplied configuration values.
    pub user_config: Option<&'a UserConfig>,
}

impl<'a> SubstitutionContext<'a> {
    /// Context for `extract_dir` using the host's home directory.
    pub fn new(extract_dir: &'a Path) -> Self {
        Self {
            extract_dir,
            home_dir: dirs::home_dir(),
            user_config: None,
        }
    }

    pub fn with_user_config(mut self, user_config: Option<&'a UserConfig>) -> Self {
        self.user_config = user_config;
        self
    }

    pub fn with_home_dir(mut self, home_dir: Option<PathBuf>) -> Self {
        self.home_dir = home_dir;
        self
    }

    fn home_subdir(&self, name: &str) -> Option<String> {
        self.home_dir
            .as_ref()
            .map(|home| home.join(name).to_string_lossy().into_owned())
    }

    fn lookup(&self, name: &str) -> Option<String> {
        match name {
            "__dirname" => Some(self.extract_dir.to_string_lossy().into_owned()),
            "HOME" => self
                .home_dir
                .as_ref()
                .map(|home| home.to_string_lossy().into_owned()),
            "DESKTOP" => self.home_subdir("Desktop"),
            "DOCUMENTS" => self.home_subdir("Documents"),
            "DOWNLOADS" => self.home_subdir("Downloads"),
            "pathSeparator" | "/" => Some(std::path::MAIN_SEPARATOR.to_string()),
            _ => {
                let key = name.strip_prefix(USER_CONFIG_PREFIX)?;
                self.user_config?.get(key).and_then(render_user_value)
            }
        }
    }
}

/// Expand every known placeholder in `value`.
///
/// A single left-to-right scan is used, so text produced by an expansion is
/// never scanned again.
pub fn substitute(value: &str, ctx: &SubstitutionContext<'_>) -> String {
    let mut result = String::with_capacity(value.len());
    let mut remaining = value;

    while let Some(start) = remaining.find("${") {
        result.push_str(&remaining[..start]);

        let Some(len) = remaining[start..].find('}') else {
            result.push_str(&remaining[start..]);
            remaining = "";
            break;
        };
        let end = start + len + 1;
        let name = &remaining[start + 2..start + len];

        // A stray `${` before the closing brace opens no placeholder; resume
        // at the last `${` so the real one after it still expands.
        if let Some(inner) = name.rfind("${") {
            let resume = start + 2 + inner;
            result.push_str(&remaining[start..resume]);
            remaining = &remaining[resume..];
            continue;
        }

        match ctx.lookup(name) {
            Some(expanded) => result.push_str(&expanded),
            None => result.push_str(&remaining[start..end]),
        }
        remaining = &remaining[end..];
    }

    result.push_str(remaining);
    result
}

/// Render a user-config value as placeholder text. `null` counts as unset.
fn render_user_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(_) | Value::Number(_) | Value::Object(_) => Some(value.to_string()),
        Value::Array(items) => Some(
            items
                .iter()
                .map(|item| render_user_value(item).unwrap_or_default())
                .collect::<Vec<_>>()
                .join(","),
        ),
    }
}
