//! Shared test utilities for the extension installer workspace.
//!
//! Dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`archive`]: [`ArchiveBuilder`] for extension zip archives, including
//!   hostile ones
//! - [`env`]: [`TestEnv`] with isolated temp and extensions roots

pub mod archive;
pub mod env;

pub use archive::{ArchiveBuilder, sample_manifest};
pub use env::TestEnv;
