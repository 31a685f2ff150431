//! Directory status aggregation.
//!
//! A directory's displayed status is derived on read from its own status and
//! the statuses of its cached descendants:
//!
//! 1. own status `added`, `modified` or `deleted` wins outright;
//! 2. otherwise any `conflicted` descendant makes it `conflicted`;
//! 3. otherwise any `obstructed` descendant makes it `obstructed`;
//! 4. otherwise any descendant in [`MODIFIED_STATUSES`] makes it `modified`;
//! 5. otherwise its own status is shown.
//!
//! A path with no descendants in the given set (a file, or an empty
//! directory) always shows its own status.

use crate::paths::is_under;
use crate::status::{PathStatus, StatusKind, MODIFIED_STATUSES};
use std::collections::HashMap;
use std::path::Path;

/// What the descendants of a directory contain, as far as display goes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct DescendantFlags {
    conflicted: bool,
    obstructed: bool,
    modified: bool,
}

impl DescendantFlags {
    fn record(&mut self, status: StatusKind) {
        match status {
            StatusKind::Conflicted => self.conflicted = true,
            StatusKind::Obstructed => self.obstructed = true,
            other if MODIFIED_STATUSES.contains(&other) => self.modified = true,
            _ => {}
        }
    }

    fn resolve(self, own: StatusKind) -> StatusKind {
        if matches!(
            own,
            StatusKind::Added | StatusKind::Modified | StatusKind::Deleted
        ) {
            return own;
        }
        if self.conflicted {
            StatusKind::Conflicted
        } else if self.obstructed {
            StatusKind::Obstructed
        } else if self.modified {
            StatusKind::Modified
        } else {
            own
        }
    }
}

/// Combine a path's own text status with the text statuses of its descendants.
pub fn aggregate(own: StatusKind, descendants: impl IntoIterator<Item = StatusKind>) -> StatusKind {
    let mut flags = DescendantFlags::default();
    for status in descendants {
        flags.record(status);
    }
    flags.resolve(own)
}

/// Display status of `path` given cached statuses for it and its descendants.
///
/// Entries outside `path`'s subtree are ignored. If `path` itself has no
/// entry its own status is taken to be `unknown`.
pub fn display_status(path: &Path, statuses: &[PathStatus]) -> StatusKind {
    let own = statuses
        .iter()
        .find(|s| s.path == path)
        .map(|s| s.text_status)
        .unwrap_or(StatusKind::Unknown);

    aggregate(
        own,
        statuses
            .iter()
            .filter(|s| s.path != path && is_under(path, &s.path))
            .map(|s| s.text_status),
    )
}

/// Replace the text status of every entry that has descendants in `statuses`
/// with its aggregated display status. Property statuses are left alone.
///
/// Runs in O(entries * depth).
pub fn annotate(statuses: Vec<PathStatus>) -> Vec<PathStatus> {
    let flags = {
        let index: HashMap<&Path, usize> = statuses
            .iter()
            .enumerate()
            .map(|(i, s)| (s.path.as_path(), i))
            .collect();

        let mut flags: Vec<Option<DescendantFlags>> = vec![None; statuses.len()];
        for status in &statuses {
            for ancestor in status.path.ancestors().skip(1) {
                if let Some(&i) = index.get(ancestor) {
                    flags[i]
                        .get_or_insert_with(DescendantFlags::default)
                        .record(status.text_status);
                }
            }
        }
        flags
    };

    statuses
        .into_iter()
        .zip(flags)
        .map(|(mut status, flags)| {
            if let Some(flags) = flags {
                status.text_status = flags.resolve(status.text_status);
            }
            status
        })
        .collect()
}

/// Combined text and property emblem for `path` and its subtree.
///
/// Unlike [`display_status`] this also looks at property statuses and turns
/// any client failure (or an empty result) into `client_error`.
pub fn summarize(path: &Path, statuses: &[PathStatus]) -> StatusKind {
    let relevant: Vec<&PathStatus> = statuses
        .iter()
        .filter(|s| is_under(path, &s.path))
        .collect();

    if relevant.is_empty()
        || relevant.iter().any(|s| {
            s.text_status == StatusKind::ClientError || s.prop_status == StatusKind::ClientError
        })
    {
        return StatusKind::ClientError;
    }

    let own = relevant.iter().find(|s| s.path == path);

    if relevant.iter().any(|s| s.path != path) {
        if relevant
            .iter()
            .any(|s| s.text_status == StatusKind::Conflicted)
        {
            return StatusKind::Conflicted;
        }
        if relevant
            .iter()
            .any(|s| s.text_status == StatusKind::Obstructed)
        {
            return StatusKind::Obstructed;
        }
        if let Some(own) = own {
            if matches!(
                own.text_status,
                StatusKind::Added | StatusKind::Modified | StatusKind::Deleted
            ) {
                return own.text_status;
            }
        }
        if relevant
            .iter()
            .any(|s| s.text_status.is_modified() || s.prop_status.is_modified())
        {
            return StatusKind::Modified;
        }
    }

    own.map(|s| s.text_status).unwrap_or(StatusKind::Normal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use StatusKind::*;

    fn st(path: &str, text: StatusKind) -> PathStatus {
        PathStatus::new(path, text, None)
    }

    #[test]
    fn test_conflict_beats_modification() {
        let statuses = vec![
            st("/wc/d", Normal),
            st("/wc/d/a", Conflicted),
            st("/wc/d/b", Modified),
        ];
        assert_eq!(display_status(Path::new("/wc/d"), &statuses), Conflicted);
    }

    #[test]
    fn test_own_pending_operation_beats_everything() {
        let statuses = vec![st("/wc/d", Added), st("/wc/d/a", Conflicted)];
        assert_eq!(display_status(Path::new("/wc/d"), &statuses), Added);
    }

    #[test]
    fn test_obstructed_beats_modified() {
        assert_eq!(aggregate(Normal, [Modified, Obstructed]), Obstructed);
    }

    #[test]
    fn test_missing_descendant_counts_as_modified() {
        assert_eq!(aggregate(Normal, [Normal, Missing]), Modified);
        assert_eq!(aggregate(Normal, [Unversioned, Ignored]), Normal);
    }

    #[test]
    fn test_own_status_kept_without_descendants() {
        assert_eq!(aggregate(Replaced, std::iter::empty()), Replaced);
        let statuses = vec![st("/wc/file.txt", Conflicted)];
        assert_eq!(display_status(Path::new("/wc/file.txt"), &statuses), Conflicted);
    }

    #[test]
    fn test_display_ignores_siblings() {
        let statuses = vec![st("/wc/d", Normal), st("/wc/d2", Modified), st("/wc", Normal)];
        assert_eq!(display_status(Path::new("/wc/d"), &statuses), Normal);
    }

    #[test]
    fn test_annotate_propagates_to_every_ancestor_in_set() {
        let statuses = vec![
            st("/wc", Normal),
            st("/wc/sub", Normal),
            st("/wc/sub/deep", Normal),
            st("/wc/sub/deep/file.txt", Modified),
            st("/wc/clean", Normal),
        ];
        let annotated = annotate(statuses);
        let get = |p: &str| {
            annotated
                .iter()
                .find(|s| s.path == Path::new(p))
                .unwrap()
                .text_status
        };
        assert_eq!(get("/wc"), Modified);
        assert_eq!(get("/wc/sub"), Modified);
        assert_eq!(get("/wc/sub/deep"), Modified);
        assert_eq!(get("/wc/sub/deep/file.txt"), Modified);
        assert_eq!(get("/wc/clean"), Normal);
    }

    #[test]
    fn test_annotate_keeps_prop_status() {
        let statuses = vec![
            PathStatus::new("/wc", Normal, Modified),
            st("/wc/a", Conflicted),
        ];
        let annotated = annotate(statuses);
        assert_eq!(annotated[0].text_status, Conflicted);
        assert_eq!(annotated[0].prop_status, Modified);
    }

    #[test]
    fn test_summarize_counts_property_changes() {
        let statuses = vec![
            PathStatus::new("/wc", Normal, None),
            PathStatus::new("/wc/a", Normal, Modified),
        ];
        assert_eq!(summarize(Path::new("/wc"), &statuses), Modified);
    }

    #[test]
    fn test_summarize_reports_client_errors() {
        assert_eq!(summarize(Path::new("/wc"), &[]), ClientError);
        let statuses = vec![st("/wc", Normal), PathStatus::client_error("/wc/a")];
        assert_eq!(summarize(Path::new("/wc"), &statuses), ClientError);
    }

    #[test]
    fn test_summarize_plain_file() {
        let statuses = vec![st("/wc/f", Added)];
        assert_eq!(summarize(Path::new("/wc/f"), &statuses), Added);
    }
}
