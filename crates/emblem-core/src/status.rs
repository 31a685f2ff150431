//! Status values for paths in a working copy.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Version-control state of a path's content or properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    /// Nothing to report (e.g. no properties set).
    None,
    /// Not under version control.
    Unversioned,
    /// Versioned and unchanged.
    Normal,
    /// Scheduled for addition.
    Added,
    /// Versioned but absent from disk.
    Missing,
    /// Scheduled for deletion.
    Deleted,
    /// Deleted and re-added in place.
    Replaced,
    /// Locally modified.
    Modified,
    /// Changes from the repository were merged in.
    Merged,
    /// In a conflicted state.
    Conflicted,
    /// Ignored by the working copy.
    Ignored,
    /// Something unversioned is in the way of a versioned item.
    Obstructed,
    /// Defined by an externals definition.
    External,
    /// Directory whose entries are incomplete (interrupted checkout/update).
    Incomplete,
    /// Placeholder while a status check is in flight.
    Calculating,
    /// Not inside a working copy, or not determinable.
    Unknown,
    /// The version-control client failed for this path.
    ClientError,
}

/// Statuses that make a parent directory show as modified.
pub const MODIFIED_STATUSES: [StatusKind; 5] = [
    StatusKind::Added,
    StatusKind::Deleted,
    StatusKind::Replaced,
    StatusKind::Modified,
    StatusKind::Missing,
];

impl StatusKind {
    /// Every status, in declaration order.
    pub const ALL: [StatusKind; 17] = [
        Self::None,
        Self::Unversioned,
        Self::Normal,
        Self::Added,
        Self::Missing,
        Self::Deleted,
        Self::Replaced,
        Self::Modified,
        Self::Merged,
        Self::Conflicted,
        Self::Ignored,
        Self::Obstructed,
        Self::External,
        Self::Incomplete,
        Self::Calculating,
        Self::Unknown,
        Self::ClientError,
    ];

    /// Wire/display name, e.g. `"client_error"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Unversioned => "unversioned",
            Self::Normal => "normal",
            Self::Added => "added",
            Self::Missing => "missing",
            Self::Deleted => "deleted",
            Self::Replaced => "replaced",
            Self::Modified => "modified",
            Self::Merged => "merged",
            Self::Conflicted => "conflicted",
            Self::Ignored => "ignored",
            Self::Obstructed => "obstructed",
            Self::External => "external",
            Self::Incomplete => "incomplete",
            Self::Calculating => "calculating",
            Self::Unknown => "unknown",
            Self::ClientError => "client_error",
        }
    }

    /// Whether this status counts as "modified" for a parent directory.
    pub fn is_modified(&self) -> bool {
        MODIFIED_STATUSES.contains(self)
    }

    /// Whether this is the transient in-flight placeholder.
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Calculating)
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unrecognised status name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status kind: {0}")]
pub struct ParseStatusError(pub String);

impl FromStr for StatusKind {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ParseStatusError(s.to_string()))
    }
}

/// The status of a single path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathStatus {
    /// Absolute, normalized path.
    pub path: PathBuf,
    /// Content status.
    pub text_status: StatusKind,
    /// Property status, tracked independently of content.
    pub prop_status: StatusKind,
}

impl PathStatus {
    pub fn new(path: impl Into<PathBuf>, text_status: StatusKind, prop_status: StatusKind) -> Self {
        Self {
            path: path.into(),
            text_status,
            prop_status,
        }
    }

    /// A status with the same value for text and properties.
    pub fn uniform(path: impl Into<PathBuf>, status: StatusKind) -> Self {
        Self::new(path, status, status)
    }

    pub fn calculating(path: impl Into<PathBuf>) -> Self {
        Self::uniform(path, StatusKind::Calculating)
    }

    pub fn unknown(path: impl Into<PathBuf>) -> Self {
        Self::uniform(path, StatusKind::Unknown)
    }

    pub fn client_error(path: impl Into<PathBuf>) -> Self {
        Self::uniform(path, StatusKind::ClientError)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
