//! Watch registry: decides where OS watches go and which paths asked for
//! live updates.
//!
//! Two sets are tracked under one lock, separate from the status cache lock:
//!
//! - OS roots: paths with a recursive backend watch. A new path only gets a
//!   new watch when none of its ancestors already has one, and the watch is
//!   attached at the outermost ancestor inside a working copy, so a whole
//!   working copy costs one watch.
//! - Interesting paths: every path passed to [`WatchRegistry::add_watch`]
//!   that lies in a working copy. [`WatchRegistry::has_watch`] answers for
//!   these only, not for everything under a recursive watch.

use crate::error::Result;
use crate::traits::WatchBackend;
use emblem_core::paths::normalize;
use emblem_core::vcs::WorkingCopyProbe;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Default)]
struct RegistryState {
    os_roots: HashSet<PathBuf>,
    interesting: HashSet<PathBuf>,
}

/// Tracks OS watch roots and explicitly registered paths.
pub struct WatchRegistry {
    probe: Arc<dyn WorkingCopyProbe>,
    backend: Arc<dyn WatchBackend>,
    state: Mutex<RegistryState>,
}

impl WatchRegistry {
    /// Create a registry that places watches through `backend`.
    pub fn new(probe: Arc<dyn WorkingCopyProbe>, backend: Arc<dyn WatchBackend>) -> Self {
        Self {
            probe,
            backend,
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// Register interest in `path`.
    ///
    /// Returns the root of the OS watch created for it, or `None` when an
    /// existing watch already covers it or it is not in a working copy.
    pub fn add_watch(&self, path: &Path) -> Result<Option<PathBuf>> {
        let path = normalize(path);
        let root = {
            let mut state = self.state.lock();

            if self.probe.is_in_or_under_working_copy(&path) {
                state.interesting.insert(path.clone());
            }

            let mut attach_at = None;
            for ancestor in path.ancestors() {
                if state.os_roots.contains(ancestor) {
                    debug!(path = %path.display(), root = %ancestor.display(), "already watched");
                    return Ok(None);
                }
                if !self.probe.is_in_or_under_working_copy(ancestor) {
                    // Nothing above a non-member can be a member.
                    break;
                }
                attach_at = Some(ancestor);
            }

            match attach_at {
                Some(root) => root.to_path_buf(),
                None => {
                    debug!(path = %path.display(), "not in a working copy, no watch");
                    return Ok(None);
                }
            }
        };

        // The backend may block or call back into the registry from its
        // dispatch thread, so it runs without the state lock.
        self.backend.watch_recursive(&root)?;

        if !self.state.lock().os_roots.insert(root.clone()) {
            debug!(root = %root.display(), "watch raced with another registration");
            return Ok(None);
        }
        info!(path = %path.display(), root = %root.display(), "added watch");
        Ok(Some(root))
    }

    /// Whether `path` itself was registered through [`add_watch`](Self::add_watch).
    pub fn has_watch(&self, path: &Path) -> bool {
        self.state.lock().interesting.contains(&normalize(path))
    }

    /// Roots of the OS watches created so far.
    pub fn watched_roots(&self) -> Vec<PathBuf> {
        self.state.lock().os_roots.iter().cloned().collect()
    }

    /// Tear down every OS watch and forget all registrations.
    pub fn shutdown(&self) {
        let state = std::mem::take(&mut *self.state.lock());
        debug!(roots = state.os_roots.len(), "shutting down watches");
        self.backend.shutdown();
    }
}
