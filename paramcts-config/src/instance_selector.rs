use std::path::{Path, PathBuf};

use paramcts_types::Assignment;
use rand::seq::SliceRandom;

use crate::error::InstanceError;

/// Enumerates instance files under a set of root directories once, at
/// construction, following symlinks (mirrors `configuration.py`'s
/// `InstanceSelector`).
#[derive(Debug, Clone)]
pub struct InstanceSelector {
    variable_name: String,
    instances: Vec<PathBuf>,
}

impl InstanceSelector {
    pub fn new(
        roots: &[impl AsRef<Path>],
        variable_name: impl Into<String>,
        absolute_paths: bool,
    ) -> Result<Self, InstanceError> {
        let mut instances = Vec::new();
        for root in roots {
            for entry in walkdir::WalkDir::new(root).follow_links(true) {
                let entry = entry.map_err(|source| InstanceError::Walk {
                    path: root.as_ref().display().to_string(),
                    source,
                })?;
                if entry.file_type().is_file() {
                    let path = entry.path().to_path_buf();
                    instances.push(if absolute_paths {
                        path.canonicalize().unwrap_or(path)
                    } else {
                        path
                    });
                }
            }
        }
        Ok(Self { variable_name: variable_name.into(), instances })
    }

    pub fn instances(&self) -> &[PathBuf] {
        &self.instances
    }

    /// A uniformly random instance path, or `None` if no instances were
    /// found under the configured roots.
    pub fn random(&self) -> Option<&Path> {
        self.instances.choose(&mut rand::thread_rng()).map(PathBuf::as_path)
    }

    /// `random()` wrapped as an [`Assignment`] for the configured instance
    /// variable name.
    pub fn random_assignment(&self) -> Option<Assignment> {
        self.random().map(|path| Assignment::new(self.variable_name.clone(), path.display().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn random_is_none_for_empty_selector() {
        let dir = tempdir();
        let selector = InstanceSelector::new(&[dir.path()], "instance", false).unwrap();
        assert!(selector.random().is_none());
    }

    #[test]
    fn random_picks_an_enumerated_file() {
        let dir = tempdir();
        let file_path = dir.path().join("a.cnf");
        std::fs::File::create(&file_path).unwrap().write_all(b"x").unwrap();

        let selector = InstanceSelector::new(&[dir.path()], "instance", false).unwrap();
        let picked = selector.random().unwrap();
        assert_eq!(picked, file_path);
        let assignment = selector.random_assignment().unwrap();
        assert_eq!(assignment.name, "instance");
    }

    fn tempdir() -> TestDir {
        TestDir::new()
    }

    /// Minimal self-cleaning temp directory so this crate doesn't need to
    /// pull in `tempfile` just for its own tests (paramcts-exec already
    /// carries that dependency for the compression sniffer).
    struct TestDir(std::path::PathBuf);

    impl TestDir {
        fn new() -> Self {
            let nanos = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos();
            let mut path = std::env::temp_dir();
            path.push(format!("paramcts-config-test-{}-{}", std::process::id(), nanos));
            std::fs::create_dir_all(&path).unwrap();
            Self(path)
        }

        fn path(&self) -> &std::path::Path {
            &self.0
        }
    }

    impl Drop for TestDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }
}
