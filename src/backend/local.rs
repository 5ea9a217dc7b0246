//! Local backup directory backend

use std::io::Read;
use std::path::{Path, PathBuf};

use super::{
    copy_into, list_archive_dir, open_archive, remove_archive, ArchiveInfo, Backend, BackendKind,
};
use crate::error::VaultResult;

/// Archives kept in a directory on the node's own filesystem
#[derive(Debug, Clone)]
pub struct LocalBackend {
    dir: PathBuf,
}

impl LocalBackend {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Backend for LocalBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    fn store(&self, archive: &Path, name: &str) -> VaultResult<PathBuf> {
        // Archives are built in place, so the usual store is a no-op
        let in_place = archive.parent() == Some(self.dir.as_path())
            && archive.file_name().map_or(false, |n| n == name);
        if in_place {
            return Ok(archive.to_path_buf());
        }
        copy_into(&self.dir, archive, name)
    }

    fn list(&self) -> VaultResult<Vec<ArchiveInfo>> {
        list_archive_dir(&self.dir)
    }

    fn fetch(&self, name: &str) -> VaultResult<Box<dyn Read>> {
        open_archive(&self.dir, name)
    }

    fn delete(&self, name: &str) -> VaultResult<()> {
        remove_archive(&self.dir, name)
    }
}
