//! # Emblem change watching
//!
//! Keeps working-copy status fresh by watching the filesystem:
//!
//! - [`WatchRegistry`] decides where recursive OS watches go (one per
//!   working copy) and remembers which paths asked for live updates.
//! - [`ChangeNotifier`] wraps `notify`, drops noise from VCS metadata
//!   directories and forwards each remaining event to a [`ChangeSink`].
//!
//! ```text
//! ┌─────────────────┐    ┌──────────────────┐    ┌─────────────────┐
//! │   add_watch()   │───▶│  WatchRegistry   │───▶│ ChangeNotifier  │
//! │                 │    │ (roots, interest)│    │    (notify)     │
//! └─────────────────┘    └──────────────────┘    └─────────────────┘
//!                                                         │
//!                                                         ▼
//!                                                ┌─────────────────┐
//!                                                │   ChangeSink    │
//!                                                │  on_change(p)   │
//!                                                └─────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod backends;
pub mod error;
pub mod registry;
pub mod traits;

pub use backends::*;
pub use error::{Error, Result};
pub use registry::WatchRegistry;
pub use traits::{ChangeSink, WatchBackend};
