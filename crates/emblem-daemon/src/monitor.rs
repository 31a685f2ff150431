//! Status monitor: the single entry point for status queries and watches.
//!
//! Wraps the status checker and the watch registry, and turns their results
//! into [`MonitorEvent`]s on a broadcast channel. `StatusChanged` events pass
//! through a per-path "last delivered" filter so an unchanged status is never
//! reported twice in a row.

use anyhow::Result;
use emblem_config::EmblemConfig;
use emblem_core::paths::normalize;
use emblem_core::{
    display_status, summarize, AdminDirProbe, CheckerStats, PathStatus, StatusCache,
    StatusCallback, StatusChecker, StatusKind, SvnCommandClient, WorkingCopyProbe,
};
use emblem_watch::{ChangeNotifier, ChangeSink, EventFilter, WatchBackend, WatchRegistry};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::broadcast;
use tracing::{debug, info, trace};

/// Notification pushed to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorEvent {
    /// A new OS watch was created for `path`.
    WatchAdded { path: PathBuf },
    /// The display status of a watched path changed.
    StatusChanged { path: PathBuf, status: StatusKind },
    /// A `check_status` request resolved.
    StatusChecked {
        path: PathBuf,
        statuses: Vec<PathStatus>,
        summary: Option<StatusKind>,
    },
}

/// Immediate answer to a status check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub statuses: Vec<PathStatus>,
    pub summary: Option<StatusKind>,
}

/// Counters reported by the `Stats` method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonitorStats {
    pub checker: CheckerStats,
    pub cache_entries: usize,
    pub watches: usize,
}

struct Inner {
    this: Weak<Inner>,
    checker: StatusChecker,
    probe: Arc<dyn WorkingCopyProbe>,
    registry: WatchRegistry,
    delivered: Mutex<HashMap<PathBuf, StatusKind>>,
    events: broadcast::Sender<MonitorEvent>,
    exited: AtomicBool,
}

/// Façade over the status checker and watch registry.
pub struct StatusMonitor {
    inner: Arc<Inner>,
}

impl StatusMonitor {
    /// Build a monitor around an existing checker. Watches are placed through
    /// `backend`; the checker's probe decides working-copy membership.
    pub fn new(checker: StatusChecker, backend: Arc<dyn WatchBackend>, event_capacity: usize) -> Self {
        let probe = Arc::clone(checker.probe());
        let registry = WatchRegistry::new(Arc::clone(&probe), backend);
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            inner: Arc::new_cyclic(|this| Inner {
                this: this.clone(),
                checker,
                probe,
                registry,
                delivered: Mutex::new(HashMap::new()),
                events,
                exited: AtomicBool::new(false),
            }),
        }
    }

    /// Wire up the production stack: `svn` client, admin-dir probe and a
    /// notify-based change notifier feeding back into this monitor.
    pub fn from_config(config: &EmblemConfig) -> Result<Self> {
        let probe: Arc<dyn WorkingCopyProbe> =
            Arc::new(AdminDirProbe::new(config.vcs.admin_dir.clone()));
        let cache = Arc::new(StatusCache::with_max_entries(config.cache.max_entries));
        let checker = StatusChecker::new(cache, probe)
            .with_queue_warn_threshold(config.checker.queue_warn_threshold);
        checker.start(SvnCommandClient::new(config.vcs.program.clone()))?;

        let notifier = Arc::new(ChangeNotifier::new(EventFilter::new(
            config.watch.metadata_dir.clone(),
            config.watch.transaction_markers.clone(),
        )));
        let monitor = Self::new(checker, notifier.clone(), config.daemon.event_capacity);
        notifier.set_sink(&monitor.change_sink());

        info!(program = %config.vcs.program, "status monitor ready");
        Ok(monitor)
    }

    /// Sink that refreshes statuses for every reported change.
    pub fn change_sink(&self) -> Arc<dyn ChangeSink> {
        self.inner.clone()
    }

    /// Receive future events.
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.inner.events.subscribe()
    }

    pub fn cache(&self) -> &Arc<StatusCache> {
        self.inner.checker.cache()
    }

    pub fn has_watch(&self, path: &Path) -> bool {
        self.inner.registry.has_watch(path)
    }

    /// Register interest in `path`. Emits `WatchAdded` and returns `true` when
    /// a new OS watch had to be created.
    pub fn add_watch(&self, path: &Path) -> Result<bool> {
        let path = normalize(path);
        let added = self.inner.registry.add_watch(&path)?.is_some();
        if added {
            self.inner.emit(MonitorEvent::WatchAdded { path });
        }
        Ok(added)
    }

    /// Without `invalidate`: publish the display status of `path` computed
    /// from cached data, filling the cache first on a miss.
    ///
    /// With `invalidate`: refresh the nearest enclosing working copy and
    /// publish the new display status of every watched path in it.
    ///
    /// Unchanged statuses are not republished unless `bypass` is set. Paths
    /// outside any working copy are ignored.
    pub fn status(&self, path: &Path, invalidate: bool, bypass: bool) {
        self.inner.status(path, invalidate, bypass);
    }

    /// Check `path` through the status checker. The immediate answer is
    /// returned; the final one is also published as `StatusChecked`.
    pub fn check_status(&self, path: &Path, recurse: bool, invalidate: bool, summary: bool) -> CheckResult {
        let weak = Arc::downgrade(&self.inner);
        let callback: StatusCallback = Box::new(move |path: &Path, statuses: Vec<PathStatus>| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let summary = summary.then(|| summarize(path, &statuses));
            inner.emit(MonitorEvent::StatusChecked {
                path: path.to_path_buf(),
                statuses,
                summary,
            });
        });

        let statuses = self
            .inner
            .checker
            .check_status(path, recurse, invalidate, Some(callback));
        let summary = summary.then(|| summarize(&normalize(path), &statuses));
        CheckResult { statuses, summary }
    }

    pub fn stats(&self) -> MonitorStats {
        MonitorStats {
            checker: self.inner.checker.stats(),
            cache_entries: self.inner.checker.cache().len(),
            watches: self.inner.registry.watched_roots().len(),
        }
    }

    /// Stop the change notifier and the status checker. Idempotent.
    ///
    /// Blocks until the checker finishes its current request.
    pub fn exit(&self) {
        if self.inner.exited.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.registry.shutdown();
        self.inner.checker.stop();
        self.inner.delivered.lock().clear();
        info!("status monitor stopped");
    }

    pub fn has_exited(&self) -> bool {
        self.inner.exited.load(Ordering::Acquire)
    }
}

/// Text status reported for `path` itself in a checker result.
fn own_status(path: &Path, statuses: &[PathStatus]) -> StatusKind {
    statuses
        .iter()
        .find(|s| s.path == path)
        .map(|s| s.text_status)
        .unwrap_or(StatusKind::Unknown)
}

impl Inner {
    fn emit(&self, event: MonitorEvent) {
        if self.events.send(event).is_err() {
            trace!("no event subscribers");
        }
    }

    /// Emit `StatusChanged` unless `status` is what was last delivered for
    /// `path` (or `bypass` is set).
    fn deliver(&self, path: &Path, status: StatusKind, bypass: bool) {
        let mut delivered = self.delivered.lock();
        if !bypass && delivered.get(path) == Some(&status) {
            trace!(path = %path.display(), %status, "suppressed duplicate status");
            return;
        }
        delivered.insert(path.to_path_buf(), status);
        self.emit(MonitorEvent::StatusChanged {
            path: path.to_path_buf(),
            status,
        });
    }

    fn status(&self, path: &Path, invalidate: bool, bypass: bool) {
        let path = normalize(path);

        if invalidate {
            let Some(root) = self.probe.working_copy_root(&path) else {
                debug!(path = %path.display(), "not in a working copy, nothing to refresh");
                return;
            };
            let weak = self.this.clone();
            self.checker.check_status(
                &root,
                true,
                true,
                Some(Box::new(move |_root: &Path, statuses: Vec<PathStatus>| {
                    if let Some(inner) = weak.upgrade() {
                        for status in &statuses {
                            if inner.registry.has_watch(&status.path) {
                                inner.deliver(&status.path, status.text_status, bypass);
                            }
                        }
                    }
                })),
            );
            return;
        }

        if !self.probe.is_in_or_under_working_copy(&path) {
            debug!(path = %path.display(), "not in a working copy, no status");
            return;
        }

        let cached = self.checker.cache().get_subtree(&path);
        if cached.iter().any(|s| s.path == path) {
            self.deliver(&path, display_status(&path, &cached), bypass);
            return;
        }

        self.deliver(&path, StatusKind::Calculating, bypass);
        let weak = self.this.clone();
        self.checker.check_status(
            &path,
            true,
            false,
            Some(Box::new(move |path: &Path, statuses: Vec<PathStatus>| {
                if let Some(inner) = weak.upgrade() {
                    inner.deliver(path, own_status(path, &statuses), bypass);
                }
            })),
        );
    }
}

impl ChangeSink for Inner {
    fn on_change(&self, path: &Path) {
        debug!(path = %path.display(), "change detected");
        self.status(path, true, false);
    }
}
