//! Backup restoration for nodevault
//!
//! Resolves an archive on a backend and streams it into the extractor. A
//! restore that stops part-way leaves the entries written so far in place;
//! running it again completes it, since extraction overwrites in place.

use std::path::{Path, PathBuf};

use tracing::info;

use super::catalog::{Catalog, Selector};
use super::{load_policy_or_default, registry_for};
use crate::archive::{ArchiveExtractor, ArchiveMember, CancelFlag, ExtractReport};
use crate::backend::{ArchiveInfo, BackendKind, BackendRegistry};
use crate::config::paths::VaultPaths;
use crate::error::VaultResult;

/// What to restore, from where, to where
#[derive(Debug, Clone)]
pub struct RestoreOptions {
    pub source: BackendKind,
    pub selector: Selector,
    /// Captured paths are recreated beneath this root
    pub destination_root: PathBuf,
}

impl RestoreOptions {
    /// Restore in place (destination root `/`)
    pub fn new(source: BackendKind, selector: Selector) -> Self {
        Self {
            source,
            selector,
            destination_root: PathBuf::from("/"),
        }
    }

    pub fn destination_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.destination_root = root.into();
        self
    }
}

/// What a restore would write
#[derive(Debug, Clone)]
pub struct RestorePlan {
    pub archive: ArchiveInfo,
    pub members: Vec<ArchiveMember>,
}

/// Result of a restore operation
#[derive(Debug, Clone)]
pub struct RestoreReport {
    pub archive: ArchiveInfo,
    pub source: BackendKind,
    pub destination_root: PathBuf,
    pub extract: ExtractReport,
}

impl RestoreReport {
    /// Get a summary of what was restored
    pub fn summary(&self) -> String {
        format!(
            "{} files and {} directories restored from {}",
            self.extract.files, self.extract.directories, self.archive.name
        )
    }
}

/// Handles restoring from backups
pub struct RestoreManager {
    paths: VaultPaths,
    cancel: Option<CancelFlag>,
}

impl RestoreManager {
    /// Create a new RestoreManager
    pub fn new(paths: VaultPaths) -> Self {
        Self { paths, cancel: None }
    }

    /// Attach a cancel flag to extraction
    pub fn cancel_flag(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn registry(&self) -> BackendRegistry {
        let (policy, _) = load_policy_or_default(&self.paths);
        registry_for(&self.paths, &policy)
    }

    fn extractor(&self) -> ArchiveExtractor {
        match &self.cancel {
            Some(flag) => ArchiveExtractor::new().cancel_flag(flag.clone()),
            None => ArchiveExtractor::new(),
        }
    }

    /// Archives available on a backend, ascending
    pub fn candidates(&self, source: BackendKind) -> VaultResult<Vec<ArchiveInfo>> {
        let registry = self.registry();
        Catalog::new(registry.get(source)?).list()
    }

    /// Resolve the archive a restore would use
    pub fn resolve(&self, source: BackendKind, selector: &Selector) -> VaultResult<ArchiveInfo> {
        let registry = self.registry();
        Catalog::new(registry.get(source)?).resolve(selector)
    }

    /// Resolve the archive and read its member list, writing nothing
    pub fn plan(&self, options: &RestoreOptions) -> VaultResult<RestorePlan> {
        let registry = self.registry();
        let backend = registry.get(options.source)?;
        let archive = Catalog::new(backend).resolve(&options.selector)?;
        let members = self.extractor().list_members(backend.fetch(&archive.name)?)?;

        Ok(RestorePlan { archive, members })
    }

    /// Restore the selected archive beneath the destination root
    pub fn restore(&self, options: &RestoreOptions) -> VaultResult<RestoreReport> {
        let archive = self.resolve(options.source, &options.selector)?;
        self.restore_archive(options.source, &archive, &options.destination_root)
    }

    /// Restore an already resolved archive by name
    ///
    /// The selector is not consulted again, so an archive created or pruned
    /// after `archive` was resolved does not change what gets extracted.
    pub fn restore_archive(
        &self,
        source: BackendKind,
        archive: &ArchiveInfo,
        destination_root: &Path,
    ) -> VaultResult<RestoreReport> {
        let registry = self.registry();
        let backend = registry.get(source)?;

        info!(
            archive = %archive.name,
            source = %source,
            root = %destination_root.display(),
            "restoring archive"
        );
        let stream = backend.fetch(&archive.name)?;
        let extract = self.extractor().extract_from(stream, destination_root)?;

        Ok(RestoreReport {
            archive: archive.clone(),
            source,
            destination_root: destination_root.to_path_buf(),
            extract,
        })
    }
}
