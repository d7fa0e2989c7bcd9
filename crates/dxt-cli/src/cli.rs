//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// dxt - Install and manage extension packages
#[derive(Parser, Debug)]
#[command(name = "dxt")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Installer config file (TOML)
    #[arg(long, global = true, env = "DXT_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory holding installed extensions
    #[arg(long, global = true, env = "DXT_EXTENSIONS_ROOT", value_name = "DIR")]
    pub extensions_root: Option<PathBuf>,

    /// Root for scratch extraction directories
    #[arg(long, global = true, env = "DXT_TEMP_ROOT", value_name = "DIR")]
    pub temp_root: Option<PathBuf>,

    /// The command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Install an extension archive
    ///
    /// Replaces any existing installation of the same name.
    Install {
        /// Path to the extension archive (.dxt / .zip)
        archive: PathBuf,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Remove an installed extension
    Uninstall {
        /// Extension name from its manifest
        name: String,
    },

    /// Print the launch configuration of an installed extension
    ///
    /// Examples:
    ///   dxt resolve acme
    ///   dxt resolve acme --set api_key=abc --set port=8080
    Resolve {
        /// Extension name from its manifest
        name: String,

        /// User config value; VALUE is parsed as JSON when possible
        #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        set: Vec<(String, String)>,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// List installed extensions
    List {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Remove leftover scratch directories and uploads
    PurgeTemp,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}
