//! Lexical path helpers shared by the cache, the registry and the notifier.

use std::path::{Component, Path, PathBuf};

/// Normalize a path lexically: drop `.` components and trailing separators,
/// fold `..` into its parent.
///
/// The filesystem is not consulted, so paths that no longer exist (deleted or
/// missing items) normalize the same way as live ones.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component.as_os_str()),
            },
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(Component::CurDir.as_os_str());
    }
    out
}

/// Whether `other` is `base` or lies somewhere below it.
///
/// Comparison is per component, so `/wc2` is not under `/wc`.
pub fn is_under(base: &Path, other: &Path) -> bool {
    other.starts_with(base)
}

/// Whether `path` has a component with the given name.
pub fn has_component(path: &Path, name: &str) -> bool {
    path.components()
        .any(|c| matches!(c, Component::Normal(n) if n == name))
}
