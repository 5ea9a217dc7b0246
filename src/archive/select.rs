//! Root path selection

use std::path::{Path, PathBuf};

use crate::config::paths::VaultPaths;

/// Resolves which root directories a backup captures
#[derive(Debug, Clone)]
pub struct PathSelector {
    state_dir: PathBuf,
    data_dir: PathBuf,
}

impl PathSelector {
    /// Create a selector for the given state and user-data directories
    pub fn new(state_dir: impl Into<PathBuf>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
            data_dir: data_dir.into(),
        }
    }

    /// Create a selector from resolved paths
    pub fn from_paths(paths: &VaultPaths) -> Self {
        Self::new(paths.state_dir(), paths.data_dir())
    }

    /// Produce the ordered root list
    ///
    /// The state directory always comes first. The user-data directory follows
    /// only when requested and present; a missing data directory is skipped
    /// silently. `extra` roots (from the policy) are appended in order. Exact
    /// repeats are collapsed so no root is walked twice.
    pub fn select(&self, include_data: bool, extra: &[String]) -> Vec<PathBuf> {
        let mut roots = vec![self.state_dir.clone()];

        if include_data && self.data_dir.is_dir() {
            roots.push(self.data_dir.clone());
        }

        for path in extra.iter().filter(|p| !p.is_empty()) {
            let path = PathBuf::from(path);
            if !roots.contains(&path) {
                roots.push(path);
            }
        }

        roots
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_state_dir_always_included() {
        let temp = TempDir::new().unwrap();
        let selector = PathSelector::new(temp.path().join("state"), temp.path().join("data"));

        let roots = selector.select(false, &[]);
        assert_eq!(roots, vec![temp.path().join("state")]);
    }

    #[test]
    fn test_data_dir_requires_opt_in_and_existence() {
        let temp = TempDir::new().unwrap();
        let selector = PathSelector::new(temp.path().join("state"), temp.path().join("data"));

        // Opted in but missing: silently skipped
        assert_eq!(selector.select(true, &[]).len(), 1);

        std::fs::create_dir_all(temp.path().join("data")).unwrap();
        assert_eq!(selector.select(false, &[]).len(), 1);
        assert_eq!(
            selector.select(true, &[]),
            vec![temp.path().join("state"), temp.path().join("data")]
        );
    }

    #[test]
    fn test_extra_roots_appended_once() {
        let selector = PathSelector::new("/state", "/nonexistent-data");
        let extra = vec![
            "/state".to_string(),
            "/etc/mesh".to_string(),
            "/etc/mesh".to_string(),
            String::new(),
        ];

        let roots = selector.select(true, &extra);
        assert_eq!(roots, vec![PathBuf::from("/state"), PathBuf::from("/etc/mesh")]);
    }
}
