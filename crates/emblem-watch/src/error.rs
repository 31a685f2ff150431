//! Error types for change notification and watch registration.

use thiserror::Error;

/// Errors that can occur while watching working copies.
#[derive(Error, Debug)]
pub enum Error {
    /// File system watching error.
    #[error("File watching error: {0}")]
    Watch(String),

    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The notifier was stopped and accepts no new watches.
    #[error("Change notifier is not running")]
    NotRunning,

    /// No sink was installed before the first watch.
    #[error("No change sink set before calling watch")]
    NoSink,
}

/// Result type for watch operations.
pub type Result<T> = std::result::Result<T, Error>;
