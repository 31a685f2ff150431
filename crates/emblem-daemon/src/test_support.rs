//! Fakes shared by the monitor and server unit tests.

use crate::monitor::StatusMonitor;
use emblem_core::{PathStatus, StatusCache, StatusChecker, StatusKind, VcsClient, VcsError, WorkingCopyProbe};
use emblem_watch::WatchBackend;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Treats `/wc` as the only working copy.
pub struct FakeProbe;

impl WorkingCopyProbe for FakeProbe {
    fn is_working_copy(&self, path: &Path) -> bool {
        path == Path::new("/wc")
    }
}

pub struct FakeVcs(pub Vec<PathStatus>);

impl VcsClient for FakeVcs {
    fn status(&self, path: &Path, recurse: bool) -> Result<Vec<PathStatus>, VcsError> {
        Ok(self
            .0
            .iter()
            .filter(|s| if recurse { s.path.starts_with(path) } else { s.path == path })
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct NullBackend {
    pub watched: Mutex<Vec<PathBuf>>,
}

impl WatchBackend for NullBackend {
    fn backend_type(&self) -> &'static str {
        "null"
    }

    fn watch_recursive(&self, root: &Path) -> emblem_watch::Result<()> {
        self.watched.lock().push(root.to_path_buf());
        Ok(())
    }

    fn shutdown(&self) {}
}

pub fn tree() -> Vec<PathStatus> {
    vec![
        PathStatus::new("/wc", StatusKind::Normal, StatusKind::None),
        PathStatus::new("/wc/file.txt", StatusKind::Modified, StatusKind::None),
        PathStatus::new("/wc/sub", StatusKind::Normal, StatusKind::None),
        PathStatus::new("/wc/sub/clean.txt", StatusKind::Normal, StatusKind::None),
    ]
}

pub fn monitor() -> StatusMonitor {
    let checker = StatusChecker::new(Arc::new(StatusCache::new()), Arc::new(FakeProbe));
    checker.start(FakeVcs(tree())).unwrap();
    StatusMonitor::new(checker, Arc::new(NullBackend::default()), 64)
}
