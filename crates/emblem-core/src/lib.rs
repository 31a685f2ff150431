//! Status caching and invalidation core for version-control emblems.

pub mod aggregate;
pub mod cache;
pub mod checker;
pub mod error;
pub mod paths;
pub mod status;
pub mod vcs;

pub use aggregate::{aggregate, annotate, display_status, summarize};
pub use cache::StatusCache;
pub use checker::{CheckerStats, StatusCallback, StatusChecker};
pub use error::{Error, Result, VcsError};
pub use status::{PathStatus, StatusKind, MODIFIED_STATUSES};

// Re-export the VCS collaborator seams
pub use vcs::{AdminDirProbe, SvnCommandClient, VcsClient, WorkingCopyProbe};
