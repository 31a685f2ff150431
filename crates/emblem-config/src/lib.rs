//! # Emblem Configuration
//!
//! Typed TOML configuration for the Emblem status daemon.
//!
//! ```toml
//! [cache]
//! max_entries = 1000000
//!
//! [vcs]
//! program = "svn"
//! admin_dir = ".svn"
//!
//! [daemon]
//! socket_path = "/run/user/1000/emblem/daemon.sock"
//! ```
//!
//! ```rust,no_run
//! use emblem_config::ConfigLoader;
//!
//! let config = ConfigLoader::load()?;
//! println!("{}", config.vcs.program);
//! # Ok::<(), emblem_config::ConfigError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod error;
mod loader;

pub use config::*;
pub use error::{ConfigError, Result};
pub use loader::*;
