//! Watching backends.

pub mod notify_backend;

pub use notify_backend::{changed_paths, ChangeNotifier, EventFilter};
