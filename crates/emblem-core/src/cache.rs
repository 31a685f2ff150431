//! Thread-safe, in-memory status cache.
//!
//! Entries are kept in a [`BTreeMap`] keyed by normalized path. `PathBuf`
//! orders component-wise, so every subtree is a contiguous range starting at
//! its root and subtree reads are a single range scan.
//!
//! All operations take the same coarse lock. Writers (`fill`,
//! `replace_subtree`, `invalidate`) finish inside one critical section, so
//! readers never see a half-applied update.

use crate::paths::{is_under, normalize};
use crate::status::PathStatus;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default soft cap on the number of cached entries.
pub const DEFAULT_MAX_ENTRIES: usize = 1_000_000;

#[derive(Debug, Clone)]
struct Entry {
    status: PathStatus,
    generation: u64,
}

#[derive(Debug, Default)]
struct Inner {
    entries: BTreeMap<PathBuf, Entry>,
    /// Live entry count per fill generation.
    generations: BTreeMap<u64, usize>,
    next_generation: u64,
}

impl Inner {
    fn subtree_keys(&self, root: &Path) -> Vec<PathBuf> {
        self.entries
            .range(root.to_path_buf()..)
            .take_while(|(key, _)| is_under(root, key))
            .map(|(key, _)| key.clone())
            .collect()
    }

    fn release(&mut self, generation: u64) {
        if let Some(count) = self.generations.get_mut(&generation) {
            *count -= 1;
            if *count == 0 {
                self.generations.remove(&generation);
            }
        }
    }

    fn remove_subtree(&mut self, root: &Path) -> usize {
        let keys = self.subtree_keys(root);
        for key in &keys {
            if let Some(old) = self.entries.remove(key) {
                self.release(old.generation);
            }
        }
        keys.len()
    }

    fn insert_all(&mut self, statuses: Vec<PathStatus>) {
        let generation = self.next_generation;
        self.next_generation += 1;

        for mut status in statuses {
            let key = normalize(&status.path);
            status.path = key.clone();
            if let Some(old) = self.entries.insert(key, Entry { status, generation }) {
                self.release(old.generation);
            }
            *self.generations.entry(generation).or_insert(0) += 1;
        }
    }

    /// Drop whole generations, oldest first, until under `max_entries`. The
    /// newest generation always survives.
    fn trim(&mut self, max_entries: usize) {
        while self.entries.len() > max_entries && self.generations.len() > 1 {
            let Some((&oldest, _)) = self.generations.iter().next() else {
                break;
            };
            self.entries.retain(|_, entry| entry.generation != oldest);
            self.generations.remove(&oldest);
            debug!(generation = oldest, remaining = self.entries.len(), "trimmed status cache");
        }
    }
}

/// Cache of per-path statuses shared by the status checker and its callers.
#[derive(Debug)]
pub struct StatusCache {
    inner: Mutex<Inner>,
    max_entries: usize,
}

impl StatusCache {
    pub fn new() -> Self {
        Self::with_max_entries(DEFAULT_MAX_ENTRIES)
    }

    /// Cache that trims its oldest fills once it holds more than `max_entries`.
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_entries,
        }
    }

    /// Cached status of exactly `path`.
    pub fn get(&self, path: &Path) -> Option<PathStatus> {
        let path = normalize(path);
        self.inner
            .lock()
            .entries
            .get(&path)
            .map(|entry| entry.status.clone())
    }

    /// Whether `path` has a cached entry.
    pub fn contains(&self, path: &Path) -> bool {
        let path = normalize(path);
        self.inner.lock().entries.contains_key(&path)
    }

    /// Cached status of `path` and of every cached descendant, in path order.
    pub fn get_subtree(&self, path: &Path) -> Vec<PathStatus> {
        let path = normalize(path);
        let inner = self.inner.lock();
        inner
            .entries
            .range(path.clone()..)
            .take_while(|(key, _)| is_under(&path, key))
            .map(|(_, entry)| entry.status.clone())
            .collect()
    }

    /// [`get_subtree`](Self::get_subtree) when `recurse` is set, otherwise just
    /// the entry for `path` (if any).
    pub fn lookup(&self, path: &Path, recurse: bool) -> Vec<PathStatus> {
        if recurse {
            self.get_subtree(path)
        } else {
            self.get(path).into_iter().collect()
        }
    }

    /// Insert or replace the entries for exactly the paths in `statuses`.
    pub fn fill(&self, statuses: Vec<PathStatus>) {
        let mut inner = self.inner.lock();
        inner.insert_all(statuses);
        inner.trim(self.max_entries);
    }

    /// Remove `path` and everything cached below it.
    pub fn invalidate(&self, path: &Path) {
        let path = normalize(path);
        let removed = self.inner.lock().remove_subtree(&path);
        debug!(path = %path.display(), removed, "invalidated status cache subtree");
    }

    /// Replace the whole subtree at `root` with `statuses` in one step.
    ///
    /// Entries under `root` that are absent from `statuses` disappear.
    pub fn replace_subtree(&self, root: &Path, statuses: Vec<PathStatus>) {
        let root = normalize(root);
        let mut inner = self.inner.lock();
        inner.remove_subtree(&root);
        inner.insert_all(statuses);
        inner.trim(self.max_entries);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for StatusCache {
    fn default() -> Self {
        Self::new()
    }
}
