//! Status checker scenarios against a fake VCS client and a real on-disk
//! working-copy layout.

use emblem_core::paths::is_under;
use emblem_core::{
    AdminDirProbe, PathStatus, StatusCache, StatusCallback, StatusChecker, StatusKind, VcsClient,
    VcsError,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;

const TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Default)]
struct FakeVcs {
    tree: Arc<Vec<PathStatus>>,
    broken: Arc<Vec<PathBuf>>,
    calls: Arc<Mutex<Vec<PathBuf>>>,
    gate: Option<Arc<Mutex<mpsc::Receiver<()>>>>,
}

impl FakeVcs {
    fn new(tree: Vec<PathStatus>) -> Self {
        Self {
            tree: Arc::new(tree),
            ..Default::default()
        }
    }

    fn broken(mut self, paths: Vec<PathBuf>) -> Self {
        self.broken = Arc::new(paths);
        self
    }

    /// Every status call waits for one token on the returned sender.
    fn gated(mut self) -> (Self, mpsc::Sender<()>) {
        let (tx, rx) = mpsc::channel();
        self.gate = Some(Arc::new(Mutex::new(rx)));
        (self, tx)
    }

    fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().unwrap().clone()
    }
}

impl VcsClient for FakeVcs {
    fn status(&self, path: &Path, recurse: bool) -> Result<Vec<PathStatus>, VcsError> {
        if let Some(gate) = &self.gate {
            let _ = gate.lock().unwrap().recv();
        }
        self.calls.lock().unwrap().push(path.to_path_buf());

        if path.ends_with("panics") {
            panic!("simulated client crash");
        }
        if self.broken.iter().any(|broken| broken == path) {
            return Err(VcsError::Command {
                command: format!("svn status {}", path.display()),
                status: "exit status: 1".to_string(),
                stderr: "svn: E155037: working copy locked".to_string(),
            });
        }

        Ok(self
            .tree
            .iter()
            .filter(|s| {
                if recurse {
                    is_under(path, &s.path)
                } else {
                    s.path == path
                }
            })
            .cloned()
            .collect())
    }
}

struct Fixture {
    _dir: TempDir,
    root: PathBuf,
}

impl Fixture {
    /// `root/` is a working copy with a modified `file.txt` and a clean `sub/`.
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("wc");
        fs::create_dir_all(root.join(".svn")).unwrap();
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("file.txt"), "changed").unwrap();
        Self { _dir: dir, root }
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    fn tree(&self) -> Vec<PathStatus> {
        vec![
            PathStatus::new(&self.root, StatusKind::Normal, StatusKind::None),
            PathStatus::new(self.path("file.txt"), StatusKind::Modified, StatusKind::None),
            PathStatus::new(self.path("sub"), StatusKind::Normal, StatusKind::None),
            PathStatus::new(self.path("ok"), StatusKind::Normal, StatusKind::None),
        ]
    }

    fn checker(&self) -> StatusChecker {
        StatusChecker::new(Arc::new(StatusCache::new()), Arc::new(AdminDirProbe::default()))
    }
}

fn channel_callback() -> (StatusCallback, mpsc::Receiver<Vec<PathStatus>>) {
    let (tx, rx) = mpsc::channel();
    let callback: StatusCallback = Box::new(move |_path, statuses| {
        let _ = tx.send(statuses);
    });
    (callback, rx)
}

fn status_of(statuses: &[PathStatus], path: &Path) -> StatusKind {
    statuses
        .iter()
        .find(|s| s.path == path)
        .map(|s| s.text_status)
        .unwrap_or_else(|| panic!("no status for {}", path.display()))
}

#[test]
fn test_check_status_does_not_wait_for_the_vcs() {
    let fixture = Fixture::new();
    let (client, gate) = FakeVcs::new(fixture.tree()).gated();
    let checker = fixture.checker();
    checker.start(client).unwrap();

    let started = Instant::now();
    let statuses = checker.check_status(&fixture.root, true, true, None);

    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(statuses, vec![PathStatus::calculating(&fixture.root)]);

    gate.send(()).unwrap();
    checker.stop();
}

#[test]
fn test_recursive_refresh_reports_aggregated_root() {
    let fixture = Fixture::new();
    let checker = fixture.checker();
    checker.start(FakeVcs::new(fixture.tree())).unwrap();

    let (callback, rx) = channel_callback();
    let immediate = checker.check_status(&fixture.root, true, true, Some(callback));
    assert_eq!(immediate, vec![PathStatus::calculating(&fixture.root)]);

    let statuses = rx.recv_timeout(TIMEOUT).unwrap();
    assert_eq!(status_of(&statuses, &fixture.path("file.txt")), StatusKind::Modified);
    assert_eq!(status_of(&statuses, &fixture.root), StatusKind::Modified);
    assert_eq!(status_of(&statuses, &fixture.path("sub")), StatusKind::Normal);

    // The raw status stays in the cache; aggregation happens on read.
    let cached = checker.cache().get(&fixture.root).unwrap();
    assert_eq!(cached.text_status, StatusKind::Normal);
    checker.stop();
}

#[test]
fn test_client_failure_is_isolated_to_its_request() {
    let fixture = Fixture::new();
    let broken = fixture.path("broken");
    let client = FakeVcs::new(fixture.tree()).broken(vec![broken.clone()]);
    let checker = fixture.checker();
    checker.start(client).unwrap();

    let (callback, rx) = channel_callback();
    checker.check_status(&broken, true, false, Some(callback));
    assert_eq!(
        rx.recv_timeout(TIMEOUT).unwrap(),
        vec![PathStatus::client_error(&broken)]
    );
    assert!(checker.cache().get(&broken).is_none());

    let (callback, rx) = channel_callback();
    checker.check_status(&fixture.path("ok"), false, false, Some(callback));
    let statuses = rx.recv_timeout(TIMEOUT).unwrap();
    assert_eq!(status_of(&statuses, &fixture.path("ok")), StatusKind::Normal);

    checker.stop();
    let stats = checker.stats();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.completed, 1);
}

#[test]
fn test_worker_survives_a_panicking_client() {
    let fixture = Fixture::new();
    let checker = fixture.checker();
    checker.start(FakeVcs::new(fixture.tree())).unwrap();

    let crashing = fixture.path("panics");
    let (callback, rx) = channel_callback();
    checker.check_status(&crashing, false, true, Some(callback));
    assert_eq!(
        rx.recv_timeout(TIMEOUT).unwrap(),
        vec![PathStatus::client_error(&crashing)]
    );

    let (callback, rx) = channel_callback();
    checker.check_status(&fixture.path("sub"), false, false, Some(callback));
    let statuses = rx.recv_timeout(TIMEOUT).unwrap();
    assert_eq!(status_of(&statuses, &fixture.path("sub")), StatusKind::Normal);
    checker.stop();
}

#[test]
fn test_duplicate_queued_requests_share_one_status_call() {
    let fixture = Fixture::new();
    let (client, gate) = FakeVcs::new(fixture.tree()).gated();
    let calls = client.clone();
    let checker = fixture.checker();
    checker.start(client).unwrap();

    let (first, first_rx) = channel_callback();
    let (second, second_rx) = channel_callback();
    checker.check_status(&fixture.root, true, false, Some(first));
    checker.check_status(&fixture.root, true, false, Some(second));

    gate.send(()).unwrap();
    gate.send(()).unwrap();

    let a = first_rx.recv_timeout(TIMEOUT).unwrap();
    let b = second_rx.recv_timeout(TIMEOUT).unwrap();
    assert_eq!(a, b);
    assert_eq!(calls.calls(), vec![fixture.root.clone()]);
    checker.stop();
}

#[test]
fn test_requests_are_serviced_in_submission_order() {
    let fixture = Fixture::new();
    let (client, gate) = FakeVcs::new(fixture.tree()).gated();
    let calls = client.clone();
    let checker = fixture.checker();
    checker.start(client).unwrap();

    let order = vec![fixture.path("sub"), fixture.root.clone(), fixture.path("file.txt")];
    let mut receivers = Vec::new();
    for path in &order {
        let (callback, rx) = channel_callback();
        checker.check_status(path, false, true, Some(callback));
        receivers.push(rx);
    }
    for _ in &order {
        gate.send(()).unwrap();
    }
    for rx in receivers {
        rx.recv_timeout(TIMEOUT).unwrap();
    }

    assert_eq!(calls.calls(), order);
    checker.stop();
}

#[test]
fn test_invalidating_refresh_drops_vanished_entries() {
    let fixture = Fixture::new();
    let checker = fixture.checker();
    checker.cache().fill(vec![
        PathStatus::new(&fixture.root, StatusKind::Normal, StatusKind::None),
        PathStatus::new(fixture.path("renamed.txt"), StatusKind::Normal, StatusKind::None),
    ]);
    checker.start(FakeVcs::new(fixture.tree())).unwrap();

    let (callback, rx) = channel_callback();
    checker.check_status(&fixture.root, true, true, Some(callback));
    let statuses = rx.recv_timeout(TIMEOUT).unwrap();

    assert!(statuses.iter().all(|s| s.path != fixture.path("renamed.txt")));
    assert!(checker.cache().get(&fixture.path("renamed.txt")).is_none());
    checker.stop();
}
