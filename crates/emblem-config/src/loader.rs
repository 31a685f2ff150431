//! Configuration loading.

use crate::config::EmblemConfig;
use crate::error::{ConfigError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Loads [`EmblemConfig`] from TOML.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigLoader;

impl ConfigLoader {
    /// Default config file path: `$XDG_CONFIG_HOME/emblem/config.toml`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".config")
            })
            .join("emblem")
            .join("config.toml")
    }

    /// Load the default config file if it exists, otherwise the defaults.
    pub fn load() -> Result<EmblemConfig> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from_file(&path)
        } else {
            debug!(path = %path.display(), "no config file, using defaults");
            Ok(EmblemConfig::default())
        }
    }

    /// Load and validate a config file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<EmblemConfig> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&contents, &path.display().to_string())?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Parse and validate config text.
    pub fn load_from_str(contents: &str) -> Result<EmblemConfig> {
        Self::parse(contents, "<string>")
    }

    fn parse(contents: &str, origin: &str) -> Result<EmblemConfig> {
        let config: EmblemConfig = toml::from_str(contents).map_err(|e| ConfigError::Parse {
            origin: origin.to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }
}
