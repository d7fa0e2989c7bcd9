//! Error types for dxt-fs

use std::path::PathBuf;

/// Result type for dxt-fs operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in dxt-fs operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Path traversal detected: {path}")]
    PathTraversal { path: String },

    #[error("Null byte injection detected in {value:?}")]
    NullByteInjection { value: String },

    #[error("Command must not be empty")]
    EmptyCommand,

    #[error("Invalid launch arguments: {reason}")]
    InvalidArgumentType { reason: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn traversal(path: impl std::fmt::Display) -> Self {
        Self::PathTraversal {
            path: path.to_string(),
        }
    }
}
