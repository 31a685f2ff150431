//! Configuration schema.
//!
//! Every section has defaults, so an empty file (or no file) is a valid
//! configuration. Unknown keys are rejected.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Log levels accepted by `logging.level`.
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Top-level daemon configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmblemConfig {
    /// Status cache settings.
    pub cache: CacheConfig,
    /// Status checker settings.
    pub checker: CheckerConfig,
    /// Version-control client settings.
    pub vcs: VcsConfig,
    /// Change notification settings.
    pub watch: WatchConfig,
    /// Daemon process settings.
    pub daemon: DaemonConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Status cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Soft cap on cached entries; the oldest fills are dropped beyond it.
    pub max_entries: usize,
}

/// Status checker configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CheckerConfig {
    /// Pending-queue depth above which a warning is logged.
    pub queue_warn_threshold: u64,
}

/// Version-control client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VcsConfig {
    /// Program used for status queries.
    pub program: String,
    /// Name of the administrative directory marking a working copy.
    pub admin_dir: String,
}

/// Change notification configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchConfig {
    /// Metadata directory whose contents are filtered out.
    pub metadata_dir: String,
    /// Files in the metadata directory that still trigger a refresh.
    pub transaction_markers: Vec<String>,
}

/// Daemon process configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    /// Socket path override.
    pub socket_path: Option<PathBuf>,
    /// PID file path override.
    pub pid_path: Option<PathBuf>,
    /// Capacity of the event broadcast channel.
    pub event_capacity: usize,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1_000_000,
        }
    }
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            queue_warn_threshold: 10_000,
        }
    }
}

impl Default for VcsConfig {
    fn default() -> Self {
        Self {
            program: "svn".to_string(),
            admin_dir: ".svn".to_string(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            metadata_dir: ".svn".to_string(),
            transaction_markers: vec!["entries".to_string(), "wc.db".to_string()],
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket_path: None,
            pid_path: None,
            event_capacity: 1024,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

fn invalid(field: &str, value: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.into(),
    }
}

impl EmblemConfig {
    /// Check values that parse but cannot be used.
    pub fn validate(&self) -> Result<()> {
        if self.cache.max_entries == 0 {
            return Err(invalid("cache.max_entries", "must be greater than zero"));
        }
        if self.vcs.program.trim().is_empty() {
            return Err(invalid("vcs.program", "must not be empty"));
        }
        if self.vcs.admin_dir.is_empty() || self.vcs.admin_dir.contains('/') {
            return Err(invalid("vcs.admin_dir", format!("{:?} is not a directory name", self.vcs.admin_dir)));
        }
        if self.watch.metadata_dir.is_empty() || self.watch.metadata_dir.contains('/') {
            return Err(invalid(
                "watch.metadata_dir",
                format!("{:?} is not a directory name", self.watch.metadata_dir),
            ));
        }
        if self.daemon.event_capacity == 0 {
            return Err(invalid("daemon.event_capacity", "must be greater than zero"));
        }
        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(invalid(
                "logging.level",
                format!("{:?} (expected one of {})", self.logging.level, LOG_LEVELS.join(", ")),
            ));
        }
        Ok(())
    }
}
