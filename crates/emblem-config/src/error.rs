//! Configuration errors.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config at {path}: {source}")]
    Io {
        /// File that was being read.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for this schema.
    #[error("failed to parse config from {origin}: {message}")]
    Parse {
        /// Where the text came from: a file path or `<string>`.
        origin: String,
        /// Parser message.
        message: String,
    },

    /// A value is out of range or otherwise unusable.
    #[error("invalid value for {field}: {value}")]
    InvalidValue {
        /// Dotted key of the offending field.
        field: String,
        /// Description of the problem.
        value: String,
    },
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
