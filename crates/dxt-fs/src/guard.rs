//! Validation primitives for untrusted paths, commands and arguments
//!
//! Every check here runs on the final form of its input: paths are compared
//! after normalization and symlink resolution, and commands are tokenized on
//! both separator styles so `..` cannot hide behind mixed separators.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::path::{normalize_absolute, resolve_existing};
use crate::{Error, Result};

const SEPARATORS: [char; 2] = ['/', '\\'];
const PARENT: &str = "..";

/// Confine `target` to be a direct child of `base_dir`.
///
/// Both paths are made absolute against the current directory, normalized,
/// and resolved through any symlinks that exist on disk. The target must sit
/// exactly one level below the base: the base itself, its ancestors, and
/// anything nested deeper are rejected with [`Error::PathTraversal`].
///
/// Returns the resolved absolute path of the child.
pub fn confine(base_dir: impl AsRef<Path>, target: impl AsRef<Path>) -> Result<PathBuf> {
    let target = target.as_ref();
    let base = resolve_existing(&normalize_absolute(base_dir)?);
    let target_abs = normalize_absolute(target)?;

    let (parent, name) = match (target_abs.parent(), target_abs.file_name()) {
        (Some(parent), Some(name)) => (parent, name),
        _ => return Err(Error::traversal(target.display())),
    };

    if resolve_existing(parent) != base {
        return Err(Error::traversal(target.display()));
    }

    let confined = base.join(name);

    // An existing entry must not be a link that leads out of the base.
    if fs::symlink_metadata(&confined).is_ok() {
        let resolved = resolve_existing(&confined);
        if resolved.parent() != Some(base.as_path()) {
            return Err(Error::traversal(target.display()));
        }
    }

    Ok(confined)
}

/// Validate a launch command.
///
/// Accepts bare executable names, absolute paths and explicitly relative
/// paths (`./bin/server`). The input is trimmed before checking; the trimmed
/// form is returned, so validating a validated command is a no-op.
pub fn validate_command(command: &str) -> Result<String> {
    let trimmed = command.trim();

    if trimmed.is_empty() {
        return Err(Error::EmptyCommand);
    }
    if trimmed.contains('\0') {
        return Err(Error::NullByteInjection {
            value: trimmed.to_string(),
        });
    }
    if has_parent_token(trimmed.split(SEPARATORS)) {
        return Err(Error::traversal(trimmed));
    }

    Ok(trimmed.to_string())
}

/// Validate launch arguments.
///
/// Only path-shaped arguments (those containing a separator) are checked for
/// traversal, so option values like `..version` pass untouched. The value
/// half of `--flag=../x` is tokenized as well.
pub fn validate_args(args: &[String]) -> Result<Vec<String>> {
    for arg in args {
        if arg.contains('\0') {
            return Err(Error::NullByteInjection { value: arg.clone() });
        }
        if arg.contains(SEPARATORS) && has_parent_token(arg.split(['/', '\\', '='])) {
            return Err(Error::traversal(arg));
        }
    }
    Ok(args.to_vec())
}

/// Validate dynamically typed launch arguments, as found in raw JSON.
///
/// Applies [`string_args`] and then [`validate_args`].
pub fn validate_arg_values(value: &Value) -> Result<Vec<String>> {
    validate_args(&string_args(value)?)
}

/// Extract launch arguments from raw JSON without checking their content.
///
/// Fails with [`Error::InvalidArgumentType`] unless `value` is an array of
/// strings; the error names the first offending element.
pub fn string_args(value: &Value) -> Result<Vec<String>> {
    let items = value.as_array().ok_or_else(|| Error::InvalidArgumentType {
        reason: format!("expected an array, found {}", json_type_name(value)),
    })?;

    items
        .iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::String(s) => Ok(s.clone()),
            other => Err(Error::InvalidArgumentType {
                reason: format!(
                    "element {index} is {}, expected a string",
                    json_type_name(other)
                ),
            }),
        })
        .collect()
}

fn has_parent_token<'a>(mut segments: impl Iterator<Item = &'a str>) -> bool {
    segments.any(|segment| segment.trim() == PARENT)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
