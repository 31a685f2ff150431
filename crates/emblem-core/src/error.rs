//! Error types for the status core.

use thiserror::Error;

/// Errors raised by the version-control collaborator.
///
/// These never escape the status checker: they are logged and turned into a
/// `client_error` status for the requested path.
#[derive(Error, Debug)]
pub enum VcsError {
    /// The client could not be spawned or its output could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The client ran but reported failure.
    #[error("command `{command}` failed ({status}): {stderr}")]
    Command {
        /// Command line that was run.
        command: String,
        /// Exit status description.
        status: String,
        /// Captured standard error.
        stderr: String,
    },

    /// Output that could not be understood.
    #[error("unparseable status output: {0}")]
    Parse(String),
}

/// Errors that can occur while driving the status core.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The status checker worker is already running.
    #[error("status checker is already running")]
    AlreadyRunning,

    /// The status checker has been stopped and no longer accepts requests.
    #[error("status checker is not running")]
    NotRunning,
}

/// Result type for status core operations.
pub type Result<T> = std::result::Result<T, Error>;
