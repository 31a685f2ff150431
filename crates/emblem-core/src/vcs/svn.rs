use super::VcsClient;
use crate::error::VcsError;
use crate::paths::normalize;
use crate::status::{PathStatus, StatusKind};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, trace, warn};

/// Number of fixed status columns before the separating space.
const STATUS_COLUMNS: usize = 7;

/// Locale `svn` runs under. Output stays untranslated and paths are printed as
/// UTF-8; under plain `C` non-ASCII names come back as `?\NNN` escapes.
const SVN_LOCALE: &str = "C.UTF-8";

/// [`VcsClient`] that shells out to the `svn` command line client.
#[derive(Debug, Clone)]
pub struct SvnCommandClient {
    program: String,
}

impl SvnCommandClient {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self, path: &Path, recurse: bool) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("status")
            .arg("-v")
            .arg("--non-interactive")
            .arg("--depth")
            .arg(if recurse { "infinity" } else { "empty" })
            .arg(path)
            .env("LC_ALL", SVN_LOCALE);
        cmd
    }
}

impl Default for SvnCommandClient {
    fn default() -> Self {
        Self::new("svn")
    }
}

impl VcsClient for SvnCommandClient {
    fn status(&self, path: &Path, recurse: bool) -> Result<Vec<PathStatus>, VcsError> {
        debug!(path = %path.display(), recurse, "running svn status");

        let output = self.command(path, recurse).output()?;
        if !output.status.success() {
            return Err(VcsError::Command {
                command: format!("{} status {}", self.program, path.display()),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let base = path.parent().unwrap_or(path);
        Ok(parse_status_output(&stdout, base))
    }
}

fn text_status(column: char) -> Option<StatusKind> {
    Some(match column {
        ' ' => StatusKind::Normal,
        'A' => StatusKind::Added,
        'C' => StatusKind::Conflicted,
        'D' => StatusKind::Deleted,
        'G' => StatusKind::Merged,
        'I' => StatusKind::Ignored,
        'M' => StatusKind::Modified,
        'R' => StatusKind::Replaced,
        'X' => StatusKind::External,
        '?' => StatusKind::Unversioned,
        '!' => StatusKind::Missing,
        '~' => StatusKind::Obstructed,
        _ => return None,
    })
}

fn prop_status(column: char) -> Option<StatusKind> {
    Some(match column {
        ' ' => StatusKind::None,
        'M' => StatusKind::Modified,
        'C' => StatusKind::Conflicted,
        _ => return None,
    })
}

/// Split off `count` whitespace-separated fields, returning the fields and the
/// untouched remainder.
fn split_fields(mut rest: &str, count: usize) -> Option<(Vec<&str>, &str)> {
    let mut fields = Vec::with_capacity(count);
    for _ in 0..count {
        rest = rest.trim_start();
        let end = rest.find(char::is_whitespace)?;
        fields.push(&rest[..end]);
        rest = &rest[end..];
    }
    Some((fields, rest.trim_start()))
}

fn parse_line(line: &str, base: &Path) -> Result<Option<PathStatus>, VcsError> {
    let columns: Vec<char> = line.chars().take(STATUS_COLUMNS + 1).collect();
    if columns.len() <= STATUS_COLUMNS || columns[STATUS_COLUMNS] != ' ' {
        return Ok(None);
    }
    // Tree-conflict description lines carry '>' in the last status column.
    if columns[STATUS_COLUMNS - 1] == '>' {
        return Ok(None);
    }
    let (Some(mut text), Some(prop)) = (text_status(columns[0]), prop_status(columns[1])) else {
        return Ok(None);
    };
    if columns[STATUS_COLUMNS - 1] == 'C' {
        text = StatusKind::Conflicted;
    }

    let offset: usize = columns.iter().map(|c| c.len_utf8()).sum();
    let rest = &line[offset..];

    // Items not versioned in their parent (externals included) carry no
    // revision or author fields.
    let raw_path = match text {
        StatusKind::Unversioned | StatusKind::Ignored | StatusKind::External => rest.trim(),
        _ => match split_fields(rest, 3) {
            Some((_, path)) => path.trim_end(),
            None => {
                return Err(VcsError::Parse(format!("missing revision fields: {:?}", line)));
            }
        },
    };
    if raw_path.is_empty() {
        return Err(VcsError::Parse(format!("missing path: {:?}", line)));
    }

    let raw_path = Path::new(raw_path);
    let path: PathBuf = if raw_path.is_absolute() {
        normalize(raw_path)
    } else {
        normalize(&base.join(raw_path))
    };

    let prop = if matches!(
        text,
        StatusKind::Unversioned | StatusKind::Ignored | StatusKind::External
    ) {
        StatusKind::None
    } else {
        prop
    };

    Ok(Some(PathStatus::new(path, text, prop)))
}

/// Parse the output of `svn status -v`.
///
/// Relative paths are resolved against `base`. Headers, changelist markers and
/// tree-conflict descriptions are skipped. A line that cannot be parsed is
/// logged and dropped; the rest of the working copy is still reported.
pub fn parse_status_output(output: &str, base: &Path) -> Vec<PathStatus> {
    let mut statuses = Vec::new();
    for line in output.lines() {
        match parse_line(line, base) {
            Ok(Some(status)) => statuses.push(status),
            Ok(None) => trace!(line, "skipping svn status line"),
            Err(err) => warn!(error = %err, "dropping svn status line"),
        }
    }
    statuses
}
