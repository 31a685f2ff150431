//! Notify-based change notifier.
//!
//! No debouncing: every qualifying OS event produces exactly one
//! [`ChangeSink::on_change`] call. Redundant notifications are absorbed
//! downstream by the status cache and the monitor's suppression filter.

use crate::{
    error::{Error, Result},
    traits::{ChangeSink, WatchBackend},
};

use emblem_core::paths::{has_component, normalize};
use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::{Mutex, RwLock};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, trace, warn};

/// Name of the dispatch thread.
pub const DISPATCH_THREAD_NAME: &str = "emblem-change-notifier";

/// Decides which paths inside VCS metadata directories are worth reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFilter {
    metadata_dir: String,
    transaction_markers: Vec<String>,
}

impl EventFilter {
    /// Filter for `metadata_dir` that lets the given marker files through.
    pub fn new(metadata_dir: impl Into<String>, transaction_markers: Vec<String>) -> Self {
        Self {
            metadata_dir: metadata_dir.into(),
            transaction_markers,
        }
    }

    /// Map an event path to the path to report, or `None` to drop it.
    ///
    /// Paths inside the metadata directory are dropped, except a transaction
    /// marker directly inside it, which is reported as the directory that
    /// owns the metadata.
    pub fn route(&self, path: &Path) -> Option<PathBuf> {
        let path = normalize(path);
        if !has_component(&path, &self.metadata_dir) {
            return Some(path);
        }

        let name = path.file_name()?.to_str()?;
        let metadata = path.parent()?;
        if metadata.file_name()? != self.metadata_dir.as_str() {
            return None;
        }
        if !self.transaction_markers.iter().any(|marker| marker == name) {
            return None;
        }
        metadata.parent().map(Path::to_path_buf)
    }
}

impl Default for EventFilter {
    fn default() -> Self {
        Self::new(".svn", vec!["entries".to_string(), "wc.db".to_string()])
    }
}

/// Paths to report for one notify event: creations, content writes and
/// move destinations. Metadata-only changes, removals and accesses are
/// ignored.
pub fn changed_paths(event: &Event, filter: &EventFilter) -> Vec<PathBuf> {
    let paths: &[PathBuf] = match event.kind {
        EventKind::Create(_) => &event.paths,
        EventKind::Modify(ModifyKind::Data(_))
        | EventKind::Modify(ModifyKind::Any)
        | EventKind::Modify(ModifyKind::Other) => &event.paths,
        // `Both` repeats a `To` that was already delivered.
        EventKind::Modify(ModifyKind::Name(RenameMode::To))
        | EventKind::Modify(ModifyKind::Name(RenameMode::Any))
        | EventKind::Modify(ModifyKind::Name(RenameMode::Other)) => &event.paths,
        _ => &[],
    };

    paths.iter().filter_map(|path| filter.route(path)).collect()
}

enum Dispatch {
    Event(notify::Result<Event>),
    Stop,
}

#[derive(Default)]
struct State {
    watcher: Option<RecommendedWatcher>,
    dispatch_tx: Option<flume::Sender<Dispatch>>,
    dispatcher: Option<JoinHandle<()>>,
    roots: Vec<PathBuf>,
    stopped: bool,
}

/// Recursive OS watcher that forwards filtered changes to a [`ChangeSink`].
///
/// The underlying notify watcher and the dispatch thread are created lazily
/// on the first watch.
pub struct ChangeNotifier {
    filter: Arc<EventFilter>,
    sink: Arc<RwLock<Option<Weak<dyn ChangeSink>>>>,
    state: Mutex<State>,
}

impl ChangeNotifier {
    /// Create a notifier. Nothing is watched until the first
    /// [`WatchBackend::watch_recursive`] call.
    pub fn new(filter: EventFilter) -> Self {
        Self {
            filter: Arc::new(filter),
            sink: Arc::new(RwLock::new(None)),
            state: Mutex::new(State::default()),
        }
    }

    /// Set the sink that receives changes.
    /// This must be called before adding any watches.
    ///
    /// Only a weak reference is kept, so the sink may own the notifier.
    pub fn set_sink(&self, sink: &Arc<dyn ChangeSink>) {
        *self.sink.write() = Some(Arc::downgrade(sink));
    }

    /// Roots currently being watched.
    pub fn watched_roots(&self) -> Vec<PathBuf> {
        self.state.lock().roots.clone()
    }

    /// Whether the OS watcher has been created and not shut down.
    pub fn is_running(&self) -> bool {
        self.state.lock().watcher.is_some()
    }

    fn initialize(&self, state: &mut State) -> Result<()> {
        let (tx, rx) = flume::unbounded();

        let event_tx = tx.clone();
        let watcher = RecommendedWatcher::new(
            move |result: notify::Result<Event>| {
                if event_tx.send(Dispatch::Event(result)).is_err() {
                    trace!("change dispatcher gone, dropping event");
                }
            },
            Config::default(),
        )
        .map_err(|e| Error::Watch(format!("Failed to create notify watcher: {}", e)))?;

        let filter = Arc::clone(&self.filter);
        let sink = Arc::clone(&self.sink);
        let dispatcher = thread::Builder::new()
            .name(DISPATCH_THREAD_NAME.to_string())
            .spawn(move || dispatch(rx, filter, sink))?;

        state.watcher = Some(watcher);
        state.dispatch_tx = Some(tx);
        state.dispatcher = Some(dispatcher);

        info!("Notify watcher initialized");
        Ok(())
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new(EventFilter::default())
    }
}

fn dispatch(
    rx: flume::Receiver<Dispatch>,
    filter: Arc<EventFilter>,
    sink: Arc<RwLock<Option<Weak<dyn ChangeSink>>>>,
) {
    while let Ok(message) = rx.recv() {
        let event = match message {
            Dispatch::Stop => break,
            Dispatch::Event(Ok(event)) => event,
            Dispatch::Event(Err(e)) => {
                error!("Notify error: {:?}", e);
                continue;
            }
        };

        let paths = changed_paths(&event, &filter);
        if paths.is_empty() {
            continue;
        }

        let Some(sink) = sink.read().as_ref().and_then(Weak::upgrade) else {
            debug!("no change sink, dropping {} change(s)", paths.len());
            continue;
        };
        for path in paths {
            trace!(path = %path.display(), kind = ?event.kind, "change");
            sink.on_change(&path);
        }
    }
    debug!("change dispatcher stopped");
}

impl WatchBackend for ChangeNotifier {
    fn backend_type(&self) -> &'static str {
        "notify"
    }

    fn watch_recursive(&self, root: &Path) -> Result<()> {
        debug!("Adding watch for: {}", root.display());

        let mut state = self.state.lock();
        if state.stopped {
            return Err(Error::NotRunning);
        }
        if self.sink.read().is_none() {
            return Err(Error::NoSink);
        }

        // Initialize if not already done
        if state.watcher.is_none() {
            self.initialize(&mut state)?;
        }

        if let Some(watcher) = state.watcher.as_mut() {
            watcher
                .watch(root, RecursiveMode::Recursive)
                .map_err(|e| Error::Watch(format!("Failed to watch path: {}", e)))?;
        }

        state.roots.push(root.to_path_buf());
        info!("Added notify watch: {}", root.display());
        Ok(())
    }

    fn shutdown(&self) {
        let (dispatcher, count) = {
            let mut state = self.state.lock();
            if state.stopped {
                return;
            }
            state.stopped = true;
            state.watcher = None;
            if let Some(tx) = state.dispatch_tx.take() {
                if tx.send(Dispatch::Stop).is_err() {
                    warn!("change dispatcher already gone");
                }
            }
            (state.dispatcher.take(), std::mem::take(&mut state.roots).len())
        };

        if let Some(handle) = dispatcher {
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                error!("change dispatcher panicked");
            }
        }
        *self.sink.write() = None;
        info!(watches = count, "change notifier stopped");
    }
}

impl Drop for ChangeNotifier {
    fn drop(&mut self) {
        self.shutdown();
    }
}
