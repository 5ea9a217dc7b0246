//! Storage backends for archives
//!
//! Every backend satisfies the same capability set (store, list, fetch,
//! delete) through the [`Backend`] trait. The [`BackendRegistry`] maps the
//! policy's `target` identifier onto a concrete backend, so adding a storage
//! target never touches the dispatch logic.
//!
//! - `LocalBackend`: the node's own backup directory
//! - `RemovableBackend`: a directory on the first mounted removable medium
//! - `ObjectStoreBackend`: object storage endpoint (not implemented yet)

mod local;
mod object_store;
mod removable;

use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use local::LocalBackend;
pub use object_store::ObjectStoreBackend;
pub use removable::{RemovableBackend, REMOVABLE_SUBDIR};

use crate::archive::naming::{is_archive_file_name, ArchiveName};
use crate::config::paths::VaultPaths;
use crate::config::policy::ObjectStoreSettings;
use crate::error::{VaultError, VaultResult};

/// Identifier of a storage target
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// The local backup directory
    #[default]
    Local,
    /// Removable media (USB)
    Usb,
    /// Object storage
    S3,
}

impl BackendKind {
    pub const ALL: [BackendKind; 3] = [Self::Local, Self::Usb, Self::S3];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Usb => "usb",
            Self::S3 => "s3",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "usb" => Ok(Self::Usb),
            "s3" => Ok(Self::S3),
            other => Err(VaultError::Validation(format!(
                "Unknown backend '{}' (expected local, usb or s3)",
                other
            ))),
        }
    }
}

/// An archive as seen by a backend listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveInfo {
    /// Archive file name
    pub name: String,
    /// Size in bytes
    pub size_bytes: u64,
    /// Creation time embedded in the name, if the name follows the scheme
    pub created_at: Option<NaiveDateTime>,
    /// Where the backend holds it
    pub location: PathBuf,
}

/// Capability set every storage target implements
pub trait Backend {
    /// Which target this is
    fn kind(&self) -> BackendKind;

    /// Store a finished archive under `name`, returning its location
    fn store(&self, archive: &Path, name: &str) -> VaultResult<PathBuf>;

    /// List held archives, ascending by name
    fn list(&self) -> VaultResult<Vec<ArchiveInfo>>;

    /// Open an archive for reading
    fn fetch(&self, name: &str) -> VaultResult<Box<dyn Read>>;

    /// Remove one archive
    fn delete(&self, name: &str) -> VaultResult<()>;
}

/// Backends keyed by their identifier
pub struct BackendRegistry {
    backends: HashMap<BackendKind, Box<dyn Backend>>,
}

impl BackendRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
        }
    }

    /// Register the built-in backends for this node
    pub fn from_paths(paths: &VaultPaths, object_store: Option<ObjectStoreSettings>) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(LocalBackend::new(paths.backup_dir())));
        registry.register(Box::new(RemovableBackend::new(paths.mount_candidates().to_vec())));
        registry.register(Box::new(ObjectStoreBackend::new(object_store.unwrap_or_default())));
        registry
    }

    /// Add or replace a backend
    pub fn register(&mut self, backend: Box<dyn Backend>) {
        self.backends.insert(backend.kind(), backend);
    }

    /// Look up a backend by identifier
    pub fn get(&self, kind: BackendKind) -> VaultResult<&dyn Backend> {
        self.backends
            .get(&kind)
            .map(|b| b.as_ref())
            .ok_or_else(|| VaultError::Validation(format!("No backend registered for '{}'", kind)))
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Reject names that are not a single plain file name
fn validate_name(name: &str) -> VaultResult<()> {
    let path = Path::new(name);
    if name.is_empty() || path.file_name().map_or(true, |n| n != path.as_os_str()) {
        return Err(VaultError::Validation(format!("Invalid archive name: {}", name)));
    }
    Ok(())
}

/// List the archives in a directory; a missing directory holds none
fn list_archive_dir(dir: &Path) -> VaultResult<Vec<ArchiveInfo>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut archives = Vec::new();

    for entry in fs::read_dir(dir).map_err(|e| {
        VaultError::Io(format!("Failed to read backup directory {}: {}", dir.display(), e))
    })? {
        let entry = entry
            .map_err(|e| VaultError::Io(format!("Failed to read directory entry: {}", e)))?;

        let name = entry.file_name().to_string_lossy().to_string();
        if !is_archive_file_name(&name) {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(m) if m.is_file() => m,
            Ok(_) => continue,
            Err(e) => {
                debug!(name = %name, error = %e, "skipping unreadable archive entry");
                continue;
            }
        };

        archives.push(ArchiveInfo {
            created_at: ArchiveName::parse(&name).map(|n| n.timestamp),
            size_bytes: metadata.len(),
            location: entry.path(),
            name,
        });
    }

    archives.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(archives)
}

fn open_archive(dir: &Path, name: &str) -> VaultResult<Box<dyn Read>> {
    validate_name(name)?;
    let path = dir.join(name);
    match File::open(&path) {
        Ok(file) => Ok(Box::new(BufReader::new(file))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(VaultError::archive_not_found(name))
        }
        Err(e) => Err(VaultError::Io(format!("Failed to open {}: {}", path.display(), e))),
    }
}

fn remove_archive(dir: &Path, name: &str) -> VaultResult<()> {
    validate_name(name)?;
    let path = dir.join(name);
    match fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(VaultError::archive_not_found(name))
        }
        Err(e) => Err(VaultError::Io(format!("Failed to delete {}: {}", path.display(), e))),
    }
}

/// Copy an archive into `dir` under a hidden name, then rename it into place
fn copy_into(dir: &Path, archive: &Path, name: &str) -> VaultResult<PathBuf> {
    validate_name(name)?;
    fs::create_dir_all(dir).map_err(|e| {
        VaultError::Io(format!("Failed to create directory {}: {}", dir.display(), e))
    })?;

    let destination = dir.join(name);
    let temp = dir.join(format!(".{}.partial", name));

    let copied = fs::copy(archive, &temp)
        .and_then(|_| File::open(&temp)?.sync_all())
        .and_then(|_| fs::rename(&temp, &destination));

    if let Err(e) = copied {
        let _ = fs::remove_file(&temp);
        return Err(VaultError::Io(format!(
            "Failed to copy {} to {}: {}",
            archive.display(),
            destination.display(),
            e
        )));
    }

    Ok(destination)
}
