//! Path management for nodevault
//!
//! Resolves every filesystem location the archive engine touches.
//!
//! ## Path Resolution
//!
//! Each location has a fixed default that can be overridden through the
//! environment:
//!
//! | Location              | Default                          | Override              |
//! |-----------------------|----------------------------------|-----------------------|
//! | Node state directory  | `/var/lib/nodevault`             | `NODEVAULT_STATE_DIR` |
//! | User-data directory   | `/var/lib/data`                  | `NODEVAULT_DATA_DIR`  |
//! | Scheduler projection  | `/etc/cron.d/nodevault-backup`   | `NODEVAULT_CRON_FILE` |
//! | Removable mounts      | `/mnt/usb:/media/usb:/run/media` | `NODEVAULT_MOUNTS`    |
//!
//! The local backup directory and the policy document always live under the
//! state directory.

use std::path::{Path, PathBuf};

const DEFAULT_STATE_DIR: &str = "/var/lib/nodevault";
const DEFAULT_DATA_DIR: &str = "/var/lib/data";
const DEFAULT_CRON_FILE: &str = "/etc/cron.d/nodevault-backup";
const DEFAULT_MOUNTS: [&str; 3] = ["/mnt/usb", "/media/usb", "/run/media"];

/// Manages all paths used by nodevault
#[derive(Debug, Clone)]
pub struct VaultPaths {
    state_dir: PathBuf,
    data_dir: PathBuf,
    cron_file: PathBuf,
    mount_candidates: Vec<PathBuf>,
}

impl VaultPaths {
    /// Resolve paths from defaults and environment overrides
    pub fn new() -> Self {
        let state_dir = env_path("NODEVAULT_STATE_DIR").unwrap_or_else(|| DEFAULT_STATE_DIR.into());
        let data_dir = env_path("NODEVAULT_DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.into());
        let cron_file = env_path("NODEVAULT_CRON_FILE").unwrap_or_else(|| DEFAULT_CRON_FILE.into());
        let mount_candidates = std::env::var("NODEVAULT_MOUNTS")
            .ok()
            .map(|raw| parse_mount_list(&raw))
            .unwrap_or_else(|| DEFAULT_MOUNTS.iter().map(PathBuf::from).collect());

        Self {
            state_dir,
            data_dir,
            cron_file,
            mount_candidates,
        }
    }

    /// Lay out every location under a single base directory (useful for testing)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self {
            state_dir: base_dir.join("state"),
            data_dir: base_dir.join("data"),
            cron_file: base_dir.join("cron.d").join("nodevault-backup"),
            mount_candidates: vec![
                base_dir.join("mnt").join("usb"),
                base_dir.join("media").join("usb"),
                base_dir.join("run").join("media"),
            ],
        }
    }

    /// Replace the removable-media mount candidates
    pub fn with_mount_candidates(mut self, candidates: Vec<PathBuf>) -> Self {
        self.mount_candidates = candidates;
        self
    }

    /// Get the node's primary state directory
    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    /// Get the optional user-data directory
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Get the local backup directory ({state}/backups)
    pub fn backup_dir(&self) -> PathBuf {
        self.state_dir.join("backups")
    }

    /// Get the path to the backup policy document
    pub fn policy_file(&self) -> PathBuf {
        self.state_dir.join("backup.yaml")
    }

    /// Get the path of the scheduler projection file
    pub fn cron_file(&self) -> &Path {
        &self.cron_file
    }

    /// Get the ordered removable-media mount candidates
    pub fn mount_candidates(&self) -> &[PathBuf] {
        &self.mount_candidates
    }
}

impl Default for VaultPaths {
    fn default() -> Self {
        Self::new()
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Parse a colon-separated mount candidate list, ignoring empty segments
fn parse_mount_list(raw: &str) -> Vec<PathBuf> {
    raw.split(':')
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_custom_base_dir() {
        let temp_dir = TempDir::new().unwrap();
        let paths = VaultPaths::with_base_dir(temp_dir.path().to_path_buf());

        assert_eq!(paths.state_dir(), temp_dir.path().join("state"));
        assert_eq!(paths.data_dir(), temp_dir.path().join("data"));
        assert_eq!(
            paths.backup_dir(),
            temp_dir.path().join("state").join("backups")
        );
        assert_eq!(
            paths.policy_file(),
            temp_dir.path().join("state").join("backup.yaml")
        );
        assert_eq!(paths.mount_candidates().len(), 3);
    }

    #[test]
    fn test_parse_mount_list() {
        let mounts = parse_mount_list("/mnt/a::/mnt/b:");
        assert_eq!(mounts, vec![PathBuf::from("/mnt/a"), PathBuf::from("/mnt/b")]);
        assert!(parse_mount_list("").is_empty());
    }

    #[test]
    fn test_with_mount_candidates() {
        let paths = VaultPaths::with_base_dir(PathBuf::from("/tmp/x"))
            .with_mount_candidates(vec![PathBuf::from("/only")]);
        assert_eq!(paths.mount_candidates(), &[PathBuf::from("/only")]);
    }
}
