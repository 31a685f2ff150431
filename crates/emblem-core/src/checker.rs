//! Asynchronous status checker.
//!
//! Callers get an answer immediately: `unknown` outside a working copy, the
//! cached statuses on a hit, or a `calculating` placeholder. Misses and
//! invalidations are queued for a single worker thread that owns the
//! [`VcsClient`], runs the slow status call outside the cache lock, fills the
//! cache and then fires the request's callback.
//!
//! ```text
//! caller ──check_status──▶ cache hit? ──yes──▶ callback(cached)
//!                               │ no
//!                               ▼
//!                       flume queue (FIFO)
//!                               │
//!                               ▼
//!              worker: re-check ─▶ VcsClient::status ─▶ fill ─▶ callback
//! ```

use crate::aggregate::annotate;
use crate::cache::StatusCache;
use crate::error::{Error, Result};
use crate::paths::normalize;
use crate::status::PathStatus;
use crate::vcs::{VcsClient, WorkingCopyProbe};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

/// Name of the worker thread.
pub const WORKER_THREAD_NAME: &str = "emblem-status-checker";

/// Default pending-queue depth above which the checker logs a warning.
pub const DEFAULT_QUEUE_WARN_THRESHOLD: u64 = 10_000;

/// Receives the final statuses for a checked path.
pub type StatusCallback = Box<dyn FnOnce(&Path, Vec<PathStatus>) + Send>;

struct Request {
    path: PathBuf,
    recurse: bool,
    invalidate: bool,
    callback: Option<StatusCallback>,
}

enum Job {
    Check(Request),
    Shutdown,
}

/// Snapshot of the checker's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckerStats {
    /// Requests ever enqueued.
    pub queued: u64,
    /// Requests answered with real statuses.
    pub completed: u64,
    /// Requests answered with `client_error`.
    pub failed: u64,
    /// Requests waiting in the queue.
    pub pending: u64,
}

#[derive(Debug, Default)]
struct Counters {
    queued: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    pending: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> CheckerStats {
        CheckerStats {
            queued: self.queued.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            pending: self.pending.load(Ordering::Relaxed),
        }
    }
}

/// Non-blocking front end to the VCS status call.
pub struct StatusChecker {
    cache: Arc<StatusCache>,
    probe: Arc<dyn WorkingCopyProbe>,
    queue_tx: flume::Sender<Job>,
    queue_rx: flume::Receiver<Job>,
    worker: Mutex<Option<JoinHandle<()>>>,
    accepting: AtomicBool,
    cancelled: Arc<AtomicBool>,
    counters: Arc<Counters>,
    queue_warn_threshold: u64,
}

impl StatusChecker {
    /// Create a checker. Requests are queued but not serviced until
    /// [`start`](Self::start) is called.
    pub fn new(cache: Arc<StatusCache>, probe: Arc<dyn WorkingCopyProbe>) -> Self {
        let (queue_tx, queue_rx) = flume::unbounded();
        Self {
            cache,
            probe,
            queue_tx,
            queue_rx,
            worker: Mutex::new(None),
            accepting: AtomicBool::new(true),
            cancelled: Arc::new(AtomicBool::new(false)),
            counters: Arc::new(Counters::default()),
            queue_warn_threshold: DEFAULT_QUEUE_WARN_THRESHOLD,
        }
    }

    pub fn with_queue_warn_threshold(mut self, threshold: u64) -> Self {
        self.queue_warn_threshold = threshold;
        self
    }

    pub fn cache(&self) -> &Arc<StatusCache> {
        &self.cache
    }

    pub fn probe(&self) -> &Arc<dyn WorkingCopyProbe> {
        &self.probe
    }

    /// Spawn the worker thread, handing it exclusive ownership of `client`.
    pub fn start<C>(&self, client: C) -> Result<()>
    where
        C: VcsClient + 'static,
    {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Err(Error::AlreadyRunning);
        }
        if !self.accepting.load(Ordering::Acquire) {
            return Err(Error::NotRunning);
        }

        let ctx = Worker {
            client: Box::new(client),
            cache: Arc::clone(&self.cache),
            queue: self.queue_rx.clone(),
            cancelled: Arc::clone(&self.cancelled),
            counters: Arc::clone(&self.counters),
        };

        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || ctx.run())?;
        *worker = Some(handle);

        info!("status checker started");
        Ok(())
    }

    /// Stop accepting requests, wake the worker and wait for it to finish the
    /// request it is on. Idempotent.
    pub fn stop(&self) {
        self.accepting.store(false, Ordering::Release);
        self.cancelled.store(true, Ordering::Release);

        let Some(handle) = self.worker.lock().take() else {
            return;
        };
        if self.queue_tx.send(Job::Shutdown).is_err() {
            warn!("status checker queue closed before shutdown");
        }
        if handle.thread().id() == thread::current().id() {
            // Called from a callback on the worker itself; it exits after
            // returning to the loop.
            return;
        }
        if handle.join().is_err() {
            error!("status checker worker panicked");
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.lock().is_some()
    }

    pub fn stats(&self) -> CheckerStats {
        self.counters.snapshot()
    }

    /// Statuses for `path` (and its descendants when `recurse` is set).
    ///
    /// Never blocks on the VCS. Returns `[unknown]` outside a working copy,
    /// the cached statuses on a hit, otherwise `[calculating]` while the
    /// request is queued. `callback`, if given, receives the final statuses:
    /// immediately in the first two cases, from the worker thread otherwise.
    /// Directory entries carry their aggregated display status.
    pub fn check_status(
        &self,
        path: &Path,
        recurse: bool,
        invalidate: bool,
        callback: Option<StatusCallback>,
    ) -> Vec<PathStatus> {
        let path = normalize(path);

        if !self.probe.is_in_or_under_working_copy(&path) {
            let statuses = vec![PathStatus::unknown(&path)];
            if let Some(callback) = callback {
                callback(&path, statuses.clone());
            }
            return statuses;
        }

        if !invalidate {
            if let Some(statuses) = cached(&self.cache, &path, recurse) {
                debug!(path = %path.display(), "status cache hit");
                if let Some(callback) = callback {
                    callback(&path, statuses.clone());
                }
                return statuses;
            }
        }

        let placeholder = vec![PathStatus::calculating(&path)];
        self.enqueue(Request {
            path,
            recurse,
            invalidate,
            callback,
        });
        placeholder
    }

    fn enqueue(&self, request: Request) {
        if !self.accepting.load(Ordering::Acquire) {
            debug!(path = %request.path.display(), "status checker stopped, dropping request");
            return;
        }

        let path = request.path.clone();
        let pending = self.counters.pending.fetch_add(1, Ordering::Relaxed) + 1;
        self.counters.queued.fetch_add(1, Ordering::Relaxed);
        if pending == self.queue_warn_threshold + 1 {
            warn!(pending, "status check queue is backing up");
        }

        if self.queue_tx.send(Job::Check(request)).is_err() {
            self.counters.pending.fetch_sub(1, Ordering::Relaxed);
            error!(path = %path.display(), "status check queue closed");
            return;
        }
        debug!(path = %path.display(), pending, "queued status check");
    }
}

impl Drop for StatusChecker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Annotated cached statuses, if `path` itself is cached.
fn cached(cache: &StatusCache, path: &Path, recurse: bool) -> Option<Vec<PathStatus>> {
    let statuses = cache.lookup(path, recurse);
    if statuses.iter().any(|s| s.path == path) {
        Some(annotate(statuses))
    } else {
        None
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

struct Worker {
    client: Box<dyn VcsClient>,
    cache: Arc<StatusCache>,
    queue: flume::Receiver<Job>,
    cancelled: Arc<AtomicBool>,
    counters: Arc<Counters>,
}

impl Worker {
    fn run(self) {
        debug!("status checker worker running");
        while let Ok(job) = self.queue.recv() {
            if self.cancelled.load(Ordering::Acquire) {
                break;
            }
            match job {
                Job::Shutdown => break,
                Job::Check(request) => {
                    self.counters.pending.fetch_sub(1, Ordering::Relaxed);
                    self.process(request);
                }
            }
        }
        info!("status checker worker stopped");
    }

    fn process(&self, request: Request) {
        let Request {
            path,
            recurse,
            invalidate,
            callback,
        } = request;

        if !invalidate {
            if let Some(statuses) = cached(&self.cache, &path, recurse) {
                debug!(path = %path.display(), "resolved while queued, skipping status call");
                self.counters.completed.fetch_add(1, Ordering::Relaxed);
                deliver(callback, &path, statuses);
                return;
            }
        }

        let result = panic::catch_unwind(AssertUnwindSafe(|| self.client.status(&path, recurse)));

        let statuses = match result {
            Ok(Ok(statuses)) => {
                debug!(path = %path.display(), count = statuses.len(), "status call finished");
                if invalidate {
                    self.cache.replace_subtree(&path, statuses);
                } else {
                    self.cache.fill(statuses);
                }
                self.counters.completed.fetch_add(1, Ordering::Relaxed);
                cached(&self.cache, &path, recurse)
                    .unwrap_or_else(|| vec![PathStatus::unknown(&path)])
            }
            Ok(Err(err)) => {
                warn!(path = %path.display(), error = %err, "status call failed");
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                vec![PathStatus::client_error(&path)]
            }
            Err(payload) => {
                error!(
                    path = %path.display(),
                    panic = %panic_message(payload.as_ref()),
                    "status call panicked"
                );
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                vec![PathStatus::client_error(&path)]
            }
        };

        deliver(callback, &path, statuses);
    }
}

fn deliver(callback: Option<StatusCallback>, path: &Path, statuses: Vec<PathStatus>) {
    let Some(callback) = callback else {
        return;
    };
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback(path, statuses))) {
        error!(
            path = %path.display(),
            panic = %panic_message(payload.as_ref()),
            "status callback panicked"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VcsError;
    use crate::status::StatusKind;
    use std::sync::mpsc;
    use std::time::Duration;

    struct Everywhere;

    impl WorkingCopyProbe for Everywhere {
        fn is_working_copy(&self, path: &Path) -> bool {
            path == Path::new("/wc")
        }
    }

    struct FixedClient(Vec<PathStatus>);

    impl VcsClient for FixedClient {
        fn status(&self, _path: &Path, _recurse: bool) -> std::result::Result<Vec<PathStatus>, VcsError> {
            Ok(self.0.clone())
        }
    }

    fn checker() -> StatusChecker {
        StatusChecker::new(Arc::new(StatusCache::new()), Arc::new(Everywhere))
    }

    fn channel_callback() -> (StatusCallback, mpsc::Receiver<Vec<PathStatus>>) {
        let (tx, rx) = mpsc::channel();
        let callback: StatusCallback = Box::new(move |_path, statuses| {
            let _ = tx.send(statuses);
        });
        (callback, rx)
    }

    #[test]
    fn test_outside_working_copy_is_unknown_and_synchronous() {
        let checker = checker();
        let (callback, rx) = channel_callback();
        let statuses = checker.check_status(Path::new("/elsewhere/file"), true, true, Some(callback));

        assert_eq!(statuses, vec![PathStatus::unknown("/elsewhere/file")]);
        assert_eq!(rx.try_recv().unwrap(), statuses);
        assert_eq!(checker.stats().queued, 0);
    }

    #[test]
    fn test_cache_hit_answers_immediately() {
        let checker = checker();
        checker.cache().fill(vec![
            PathStatus::new("/wc", StatusKind::Normal, StatusKind::None),
            PathStatus::new("/wc/a", StatusKind::Modified, StatusKind::None),
        ]);

        let (callback, rx) = channel_callback();
        let statuses = checker.check_status(Path::new("/wc"), true, false, Some(callback));

        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].text_status, StatusKind::Modified);
        assert_eq!(rx.try_recv().unwrap(), statuses);
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let checker = checker();
        checker.start(FixedClient(vec![])).unwrap();
        assert!(matches!(checker.start(FixedClient(vec![])), Err(Error::AlreadyRunning)));
        checker.stop();
        checker.stop();
        assert!(!checker.is_running());
        assert!(matches!(checker.start(FixedClient(vec![])), Err(Error::NotRunning)));
    }

    #[test]
    fn test_queued_request_is_serviced_after_start() {
        let checker = checker();
        let (callback, rx) = channel_callback();
        let statuses = checker.check_status(Path::new("/wc"), false, false, Some(callback));
        assert_eq!(statuses, vec![PathStatus::calculating("/wc")]);
        assert_eq!(checker.stats().pending, 1);

        checker
            .start(FixedClient(vec![PathStatus::new("/wc", StatusKind::Normal, StatusKind::None)]))
            .unwrap();
        let result = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(result[0].text_status, StatusKind::Normal);

        checker.stop();
        let stats = checker.stats();
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.pending, 0);
    }

    #[test]
    fn test_requests_after_stop_are_dropped() {
        let checker = checker();
        checker.start(FixedClient(vec![])).unwrap();
        checker.stop();

        let statuses = checker.check_status(Path::new("/wc"), false, false, None);
        assert_eq!(statuses, vec![PathStatus::calculating("/wc")]);
        assert_eq!(checker.stats().queued, 0);
    }

    #[test]
    fn test_empty_client_result_reports_unknown() {
        let checker = checker();
        checker.start(FixedClient(vec![])).unwrap();
        let (callback, rx) = channel_callback();
        checker.check_status(Path::new("/wc/x"), false, true, Some(callback));

        let result = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(result, vec![PathStatus::unknown("/wc/x")]);
        checker.stop();
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
    }
}
