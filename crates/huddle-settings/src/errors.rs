//! Settings loading errors.

use std::path::PathBuf;

/// Errors raised while loading settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("failed to read settings file {path}: {source}")]
    Read {
        /// File path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The settings file is not valid JSON, or does not match the schema.
    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        /// File path.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// An environment override holds a value of the wrong type.
    #[error("invalid value for {var}: {value:?}")]
    InvalidEnv {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
    },
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, SettingsError>;
