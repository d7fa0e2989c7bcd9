use std::path::PathBuf;

/// Errors that can occur while installing or resolving extensions.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The archive handed to the installer does not exist.
    #[error("extension archive not found: {0}")]
    ArchiveNotFound(PathBuf),

    /// The archive could not be decompressed or contained a rejected entry.
    #[error("failed to extract {archive}: {reason}")]
    ExtractionFailed { archive: PathBuf, reason: String },

    /// `manifest.json` is missing, is not JSON, or is not a JSON object.
    #[error("failed to parse extension manifest: {reason}")]
    ManifestParse { reason: String },

    /// One or more required manifest fields are missing or ill-shaped.
    #[error("extension manifest is missing required fields: {}", fields.join(", "))]
    ManifestMissingField { fields: Vec<String> },

    /// The manifest name cannot be used as a directory component.
    #[error("invalid extension name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// Path or launch-command validation failure, or a filesystem error
    /// raised by the guarded helpers.
    #[error(transparent)]
    Fs(#[from] dxt_fs::Error),

    /// I/O error reading or writing extension files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Installer configuration file could not be parsed.
    #[error("failed to parse installer config at {path}: {reason}")]
    ConfigParse { path: PathBuf, reason: String },
}

/// Flat classification of [`Error`], for callers that report failures
/// without matching nested variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ArchiveNotFound,
    ExtractionFailed,
    ManifestParseError,
    ManifestMissingField,
    InvalidName,
    PathTraversal,
    NullByteInjection,
    EmptyCommand,
    InvalidArgumentType,
    FilesystemError,
    Config,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ArchiveNotFound(_) => ErrorKind::ArchiveNotFound,
            Self::ExtractionFailed { .. } => ErrorKind::ExtractionFailed,
            Self::ManifestParse { .. } => ErrorKind::ManifestParseError,
            Self::ManifestMissingField { .. } => ErrorKind::ManifestMissingField,
            Self::InvalidName { .. } => ErrorKind::InvalidName,
            Self::Fs(inner) => match inner {
                dxt_fs::Error::PathTraversal { .. } => ErrorKind::PathTraversal,
                dxt_fs::Error::NullByteInjection { .. } => ErrorKind::NullByteInjection,
                dxt_fs::Error::EmptyCommand => ErrorKind::EmptyCommand,
                dxt_fs::Error::InvalidArgumentType { .. } => ErrorKind::InvalidArgumentType,
                dxt_fs::Error::Io { .. } => ErrorKind::FilesystemError,
            },
            Self::Io(_) => ErrorKind::FilesystemError,
            Self::ConfigParse { .. } => ErrorKind::Config,
        }
    }

    /// Whether the error was caused by malformed or hostile input rather
    /// than by the environment.
    pub fn is_validation(&self) -> bool {
        !matches!(
            self.kind(),
            ErrorKind::FilesystemError | ErrorKind::Config | ErrorKind::ArchiveNotFound
        )
    }

    pub(crate) fn extraction(archive: &std::path::Path, reason: impl std::fmt::Display) -> Self {
        Self::ExtractionFailed {
            archive: archive.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
