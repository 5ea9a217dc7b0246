//! Removable media backend
//!
//! The mount point is discovered on every call by checking an ordered list of
//! candidate directories and taking the first that exists. Archives live in a
//! dedicated subdirectory of the mount.

use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{
    copy_into, list_archive_dir, open_archive, remove_archive, ArchiveInfo, Backend, BackendKind,
};
use crate::error::{VaultError, VaultResult};

/// Subdirectory of the mount that holds archives
pub const REMOVABLE_SUBDIR: &str = "nodevault-backups";

/// Archives kept on the first mounted removable medium
#[derive(Debug, Clone)]
pub struct RemovableBackend {
    candidates: Vec<PathBuf>,
}

impl RemovableBackend {
    pub fn new(candidates: Vec<PathBuf>) -> Self {
        Self { candidates }
    }

    /// Find the first candidate mount that is present
    pub fn resolve_mount(&self) -> VaultResult<PathBuf> {
        self.candidates
            .iter()
            .find(|c| c.is_dir())
            .cloned()
            .ok_or_else(|| {
                let checked: Vec<String> =
                    self.candidates.iter().map(|c| c.display().to_string()).collect();
                VaultError::Unavailable(format!(
                    "No removable media mounted (checked: {})",
                    checked.join(", ")
                ))
            })
    }

    /// The archive directory on the current mount
    pub fn archive_dir(&self) -> VaultResult<PathBuf> {
        let mount = self.resolve_mount()?;
        debug!(mount = %mount.display(), "using removable media");
        Ok(mount.join(REMOVABLE_SUBDIR))
    }
}

impl Backend for RemovableBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Usb
    }

    fn store(&self, archive: &Path, name: &str) -> VaultResult<PathBuf> {
        copy_into(&self.archive_dir()?, archive, name)
    }

    fn list(&self) -> VaultResult<Vec<ArchiveInfo>> {
        list_archive_dir(&self.archive_dir()?)
    }

    fn fetch(&self, name: &str) -> VaultResult<Box<dyn Read>> {
        open_archive(&self.archive_dir()?, name)
    }

    fn delete(&self, name: &str) -> VaultResult<()> {
        remove_archive(&self.archive_dir()?, name)
    }
}
