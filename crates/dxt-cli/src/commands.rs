//! Command implementations for dxt-cli

use std::path::Path;

use colored::Colorize;
use dxt_extensions::{CleanupOutcome, InstallationManager, ResolvedLaunchConfig, UserConfig};
use serde_json::{Value, json};

use crate::error::{CliError, Result};

/// Handle `dxt install <archive>`
pub fn run_install(manager: &InstallationManager, archive: &Path, json: bool) -> Result<()> {
    let outcome = manager.install(archive)?;

    if json {
        let report = json!({
            "name": outcome.manifest.name,
            "version": outcome.manifest.version,
            "install_dir": outcome.install_dir,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "{} Installed '{}' v{}",
        "=>".blue().bold(),
        outcome.manifest.label().cyan(),
        outcome.manifest.version
    );
    println!(
        "   {} {}",
        "Location:".dimmed(),
        outcome.install_dir.display()
    );
    Ok(())
}

/// Handle `dxt uninstall <name>`
pub fn run_uninstall(manager: &InstallationManager, name: &str) -> Result<()> {
    if !manager.uninstall(name) {
        return Err(CliError::user(format!(
            "Extension '{name}' is not installed or could not be removed"
        )));
    }
    println!("{} Uninstalled '{}'", "=>".blue().bold(), name.cyan());
    Ok(())
}

/// Handle `dxt resolve <name> [--set KEY=VALUE]...`
pub fn run_resolve(
    manager: &InstallationManager,
    name: &str,
    set: &[(String, String)],
    json: bool,
) -> Result<()> {
    let install_dir = manager.install_dir_for(name)?;
    if !install_dir.is_dir() {
        return Err(CliError::user(format!("Extension '{name}' is not installed")));
    }

    let user_config = user_config_from(set);
    let user_config = (!user_config.is_empty()).then_some(&user_config);
    let resolved = manager.launch_config(&install_dir, user_config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&resolved)?);
    } else {
        print_launch_config(&resolved);
    }
    Ok(())
}

/// Handle `dxt list`
pub fn run_list(manager: &InstallationManager, json: bool) -> Result<()> {
    let installed = manager.list_installed()?;

    if json {
        let entries: Vec<Value> = installed
            .iter()
            .map(|ext| {
                json!({
                    "name": ext.manifest.name,
                    "version": ext.manifest.version,
                    "display_name": ext.manifest.display_name,
                    "install_dir": ext.install_dir,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if installed.is_empty() {
        println!("{}", "No extensions installed.".dimmed());
        return Ok(());
    }

    for ext in &installed {
        println!(
            "{} {} {}",
            ext.manifest.name.cyan(),
            ext.manifest.version,
            ext.install_dir.display().to_string().dimmed()
        );
    }
    Ok(())
}

/// Handle `dxt purge-temp`
pub fn run_purge_temp(manager: &InstallationManager) -> Result<()> {
    let uploads = manager.config().uploads_dir();
    match manager.purge_temp() {
        CleanupOutcome::Removed => {
            println!("{} Removed {}", "=>".blue().bold(), uploads.display());
            Ok(())
        }
        CleanupOutcome::Absent => {
            println!("{}", "Nothing to purge.".dimmed());
            Ok(())
        }
        CleanupOutcome::Failed(e) => Err(CliError::Io(e)),
    }
}

/// Build user config from `KEY=VALUE` pairs.
///
/// Values that parse as JSON keep their type (`8080`, `true`, `["a","b"]`);
/// anything else is taken as a plain string.
fn user_config_from(pairs: &[(String, String)]) -> UserConfig {
    pairs
        .iter()
        .map(|(key, raw)| {
            let value =
                serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.clone()));
            (key.clone(), value)
        })
        .collect()
}

fn print_launch_config(resolved: &ResolvedLaunchConfig) {
    println!("{} {}", "command:".dimmed(), resolved.command);
    for arg in &resolved.args {
        println!("{} {}", "arg:".dimmed(), arg);
    }
    if let Some(env) = &resolved.env {
        for (key, value) in env {
            println!("{} {}={}", "env:".dimmed(), key, value);
        }
    }
}
