//! Daemon lifecycle: where the socket and PID file live, and who owns them.
//!
//! Both paths come from `[daemon]` in the config file; unset entries fall
//! back to per-user defaults. The client resolves the socket the same way so
//! a relocated daemon is still found.

use anyhow::{bail, Context, Result};
use emblem_config::{ConfigLoader, EmblemConfig};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default socket path when the config does not name one.
pub fn socket_path() -> PathBuf {
    dirs::runtime_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("emblem")
        .join("daemon.sock")
}

/// Default PID file path when the config does not name one.
pub fn pid_path() -> PathBuf {
    dirs::runtime_dir()
        .or_else(dirs::config_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join("emblem")
        .join("daemon.pid")
}

/// Socket and PID file of one daemon instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonPaths {
    pub socket: PathBuf,
    pub pid_file: PathBuf,
}

impl DaemonPaths {
    /// Paths named by `config`, with defaults for whatever it leaves unset.
    pub fn from_config(config: &EmblemConfig) -> Self {
        Self {
            socket: config.daemon.socket_path.clone().unwrap_or_else(socket_path),
            pid_file: config.daemon.pid_path.clone().unwrap_or_else(pid_path),
        }
    }

    /// Paths from the user's config file, or the defaults if it cannot be read.
    pub fn discover() -> Self {
        match ConfigLoader::load() {
            Ok(config) => Self::from_config(&config),
            Err(e) => {
                debug!("Using default daemon paths: {:#}", e);
                Self::from_config(&EmblemConfig::default())
            }
        }
    }

    /// Replace the socket path, e.g. from a command-line flag.
    pub fn with_socket(mut self, socket: Option<PathBuf>) -> Self {
        if let Some(socket) = socket {
            self.socket = socket;
        }
        self
    }

    /// PID of the live daemon recorded in the PID file, if any.
    ///
    /// A PID file naming a dead process, or holding garbage, is removed.
    pub fn running_pid(&self) -> Option<u32> {
        let contents = fs::read_to_string(&self.pid_file).ok()?;
        match contents.trim().parse::<u32>() {
            Ok(pid) if process_exists(pid) => Some(pid),
            _ => {
                warn!("Removing stale PID file {}", self.pid_file.display());
                let _ = fs::remove_file(&self.pid_file);
                None
            }
        }
    }

    /// Whether another daemon owns these paths.
    pub fn is_running(&self) -> bool {
        self.running_pid().is_some()
    }

    /// Record this process as the owner of the paths.
    ///
    /// Fails when a live daemon already holds the PID file.
    pub fn claim(&self) -> Result<()> {
        if let Some(pid) = self.running_pid() {
            if pid != std::process::id() {
                bail!("daemon already running with PID {}", pid);
            }
        }
        if let Some(parent) = self.pid_file.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(&self.pid_file, std::process::id().to_string())
            .with_context(|| format!("failed to write {}", self.pid_file.display()))?;
        Ok(())
    }

    /// Remove the PID file and socket. Missing files are not an error.
    pub fn release(&self) {
        for path in [&self.pid_file, &self.socket] {
            if let Err(e) = fs::remove_file(path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to remove {}: {}", path.display(), e);
                }
            }
        }
    }
}

// Linux-specific
fn process_exists(pid: u32) -> bool {
    Path::new(&format!("/proc/{}", pid)).exists()
}
