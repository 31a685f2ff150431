use super::WorkingCopyProbe;
use std::path::Path;

/// Working-copy detection by looking for the VCS administrative directory.
///
/// A directory is a working copy when it contains the admin directory
/// (`.svn` by default). Anything that cannot be stat'ed counts as "no".
#[derive(Debug, Clone)]
pub struct AdminDirProbe {
    admin_dir: String,
}

impl AdminDirProbe {
    pub fn new(admin_dir: impl Into<String>) -> Self {
        Self {
            admin_dir: admin_dir.into(),
        }
    }
}

impl Default for AdminDirProbe {
    fn default() -> Self {
        Self::new(".svn")
    }
}

impl WorkingCopyProbe for AdminDirProbe {
    fn is_working_copy(&self, path: &Path) -> bool {
        match std::fs::metadata(path.join(&self.admin_dir)) {
            Ok(meta) => meta.is_dir(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn working_copy() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join(".svn")).unwrap();
        fs::create_dir_all(dir.path().join("sub/deep")).unwrap();
        fs::write(dir.path().join("sub/file.txt"), "content").unwrap();
        dir
    }

    #[test]
    fn test_root_is_working_copy() {
        let wc = working_copy();
        let probe = AdminDirProbe::default();
        assert!(probe.is_working_copy(wc.path()));
        assert!(!probe.is_working_copy(&wc.path().join("sub")));
    }

    #[test]
    fn test_descendants_are_in_or_under() {
        let wc = working_copy();
        let probe = AdminDirProbe::default();
        assert!(probe.is_in_or_under_working_copy(&wc.path().join("sub/deep")));
        assert!(probe.is_in_or_under_working_copy(&wc.path().join("sub/file.txt")));
        // Deleted items still resolve through their ancestors.
        assert!(probe.is_in_or_under_working_copy(&wc.path().join("sub/gone.txt")));
        assert_eq!(
            probe.working_copy_root(&wc.path().join("sub/deep")),
            Some(wc.path().to_path_buf())
        );
    }

    #[test]
    fn test_plain_directory_is_not_a_working_copy() {
        let dir = TempDir::new().unwrap();
        let probe = AdminDirProbe::default();
        assert!(!probe.is_in_or_under_working_copy(dir.path()));
        assert_eq!(probe.working_copy_root(dir.path()), None);
    }

    #[test]
    fn test_admin_file_is_not_an_admin_dir() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".svn"), "not a directory").unwrap();
        assert!(!AdminDirProbe::default().is_working_copy(dir.path()));
    }

    #[test]
    fn test_custom_admin_dir() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("_svn")).unwrap();
        assert!(AdminDirProbe::new("_svn").is_working_copy(dir.path()));
        assert!(!AdminDirProbe::default().is_working_copy(dir.path()));
    }
}
