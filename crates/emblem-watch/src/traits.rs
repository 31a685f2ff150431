//! Core traits for the change notification system.

use crate::error::Result;
use std::path::Path;

/// Receives normalized change notifications.
///
/// Called from the notifier's dispatch thread, once per qualifying OS event.
pub trait ChangeSink: Send + Sync {
    /// Something at `path` changed.
    fn on_change(&self, path: &Path);
}

impl<F> ChangeSink for F
where
    F: Fn(&Path) + Send + Sync,
{
    fn on_change(&self, path: &Path) {
        self(path)
    }
}

/// Core trait for OS-level watching backends.
pub trait WatchBackend: Send + Sync {
    /// Get the backend type identifier.
    fn backend_type(&self) -> &'static str;

    /// Start watching `root` and everything below it.
    fn watch_recursive(&self, root: &Path) -> Result<()>;

    /// Tear down every watch. Idempotent.
    fn shutdown(&self);
}
