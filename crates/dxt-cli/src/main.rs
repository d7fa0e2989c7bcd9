//! dxt CLI
//!
//! Operator front end for installing, resolving and removing extension
//! packages.

mod cli;
mod commands;
mod error;
mod logging;

use clap::Parser;
use colored::Colorize;
use dxt_extensions::{InstallationManager, InstallerConfig};

use cli::{Cli, Commands};
use error::Result;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("warning: logging disabled: {e}");
    }
    tracing::debug!("Verbose mode enabled");

    let manager = InstallationManager::new(load_config(&cli)?);
    execute_command(&manager, cli.command)
}

/// Config file (if any), then explicit root flags on top.
fn load_config(cli: &Cli) -> Result<InstallerConfig> {
    let config = match &cli.config {
        Some(path) => InstallerConfig::load(path)?,
        None => InstallerConfig::default_locations(),
    };
    let config = config.with_overrides(cli.temp_root.clone(), cli.extensions_root.clone());
    tracing::debug!(
        temp_root = %config.temp_root.display(),
        extensions_root = %config.extensions_root.display(),
        "installer roots"
    );
    Ok(config)
}

fn execute_command(manager: &InstallationManager, cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Install { archive, json } => commands::run_install(manager, &archive, json),
        Commands::Uninstall { name } => commands::run_uninstall(manager, &name),
        Commands::Resolve { name, set, json } => commands::run_resolve(manager, &name, &set, json),
        Commands::List { json } => commands::run_list(manager, json),
        Commands::PurgeTemp => commands::run_purge_temp(manager),
    }
}
