//! Version-control collaborators.
//!
//! The status core never talks to a VCS directly. It goes through two small
//! traits:
//!
//! - [`VcsClient`]: the slow, possibly non-thread-safe status query. A client is
//!   moved into the status checker's worker thread and owned by it alone.
//! - [`WorkingCopyProbe`]: cheap membership predicates, shared by every caller.
//!
//! [`SvnCommandClient`] and [`AdminDirProbe`] are the Subversion-backed
//! implementations used by the daemon.

mod probe;
mod svn;

pub use probe::AdminDirProbe;
pub use svn::{parse_status_output, SvnCommandClient};

use crate::error::VcsError;
use crate::status::PathStatus;
use std::path::{Path, PathBuf};

/// Queries the version-control status of paths.
pub trait VcsClient: Send {
    /// Status of `path`, and of everything below it when `recurse` is set.
    ///
    /// Entries are absolute, normalized paths. Implementations may block for a
    /// long time (network or large-tree scans).
    fn status(&self, path: &Path, recurse: bool) -> std::result::Result<Vec<PathStatus>, VcsError>;
}

impl<T: VcsClient + ?Sized> VcsClient for Box<T> {
    fn status(&self, path: &Path, recurse: bool) -> std::result::Result<Vec<PathStatus>, VcsError> {
        (**self).status(path, recurse)
    }
}

/// Answers whether paths belong to a working copy.
///
/// Implementations fail closed: if membership cannot be determined the answer
/// is `false`.
pub trait WorkingCopyProbe: Send + Sync {
    /// Whether `path` is itself the root of a working copy.
    fn is_working_copy(&self, path: &Path) -> bool;

    /// Whether `path` is a working copy or lies inside one.
    fn is_in_or_under_working_copy(&self, path: &Path) -> bool {
        path.ancestors().any(|ancestor| self.is_working_copy(ancestor))
    }

    /// Nearest ancestor-or-self of `path` that is a working copy root.
    fn working_copy_root(&self, path: &Path) -> Option<PathBuf> {
        path.ancestors()
            .find(|ancestor| self.is_working_copy(ancestor))
            .map(Path::to_path_buf)
    }
}
