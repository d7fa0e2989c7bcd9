//! Filesystem primitives for the extension installer
//!
//! Provides path confinement, launch-command validation, and the robust
//! move/copy/remove helpers the installer relies on.

pub mod error;
pub mod guard;
pub mod io;
pub mod path;

pub use error::{Error, Result};
pub use guard::{confine, validate_arg_values, validate_args, validate_command};
pub use io::CleanupOutcome;
pub use path::normalize_absolute;
