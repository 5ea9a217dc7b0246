//! Archive extraction
//!
//! Reads `gzip -> tar` and recreates every directory and regular file under a
//! destination root, at the path it was captured from. Entries are restored
//! in stream order and existing files are overwritten. A failure part-way
//! leaves the entries already restored in place; running the same extraction
//! again converges on the full tree.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tracing::{debug, info};

use super::walk::EntryKind;
use super::{check_cancelled, CancelFlag};
use crate::error::{VaultError, VaultResult};

/// Mode for directories created on the way to an entry
const DIRECTORY_MODE: u32 = 0o755;

/// Summary of a finished extraction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractReport {
    pub files: usize,
    pub directories: usize,
    /// Members that are neither files nor directories
    pub skipped: usize,
    /// Payload bytes written
    pub bytes: u64,
}

/// A member as recorded in an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveMember {
    /// The captured absolute path
    pub path: PathBuf,
    pub kind: EntryKind,
    pub mode: u32,
    pub size: u64,
}

/// Restores archives onto the filesystem
#[derive(Debug, Clone, Default)]
pub struct ArchiveExtractor {
    cancel: Option<CancelFlag>,
}

impl ArchiveExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a cancel flag polled once per entry
    pub fn cancel_flag(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Extract the archive at `source` under `destination_root`
    pub fn extract(&self, source: &Path, destination_root: &Path) -> VaultResult<ExtractReport> {
        let file = File::open(source).map_err(|e| {
            VaultError::Io(format!("Failed to open archive {}: {}", source.display(), e))
        })?;
        self.extract_from(BufReader::new(file), destination_root)
    }

    /// Extract an archive stream under `destination_root`
    pub fn extract_from<R: Read>(
        &self,
        reader: R,
        destination_root: &Path,
    ) -> VaultResult<ExtractReport> {
        let mut archive = tar::Archive::new(GzDecoder::new(reader));
        let mut report = ExtractReport::default();
        let mut directory_modes: Vec<(PathBuf, u32)> = Vec::new();

        for entry in archive.entries().map_err(read_error)? {
            check_cancelled(self.cancel.as_ref())?;

            let mut entry = entry.map_err(read_error)?;
            let entry_type = entry.header().entry_type();
            let mode = entry.header().mode().map_err(read_error)?;
            let member = entry.path().map_err(read_error)?.into_owned();

            let relative = relative_member(&member)?;
            if relative.as_os_str().is_empty() {
                report.skipped += 1;
                continue;
            }
            let target = destination_root.join(&relative);

            if entry_type.is_dir() {
                create_dir_tree(&target)?;
                directory_modes.push((target, mode));
                report.directories += 1;
            } else if entry_type.is_file() {
                if let Some(parent) = target.parent() {
                    create_dir_tree(parent)?;
                }

                let mut file = OpenOptions::new()
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(&target)
                    .map_err(|e| restore_error(&target, e))?;
                let written =
                    io::copy(&mut entry, &mut file).map_err(|e| restore_error(&target, e))?;
                set_mode(&target, mode)?;

                report.files += 1;
                report.bytes += written;
            } else {
                debug!(member = %member.display(), "skipping unsupported member type");
                report.skipped += 1;
            }
        }

        // Reading to the end verifies the gzip trailer, catching truncated archives
        let mut decoder = archive.into_inner();
        io::copy(&mut decoder, &mut io::sink()).map_err(read_error)?;

        // Deepest first, so restrictive modes can't block the restore of children
        for (dir, mode) in directory_modes.iter().rev() {
            set_mode(dir, *mode)?;
        }

        info!(
            root = %destination_root.display(),
            files = report.files,
            directories = report.directories,
            "archive extracted"
        );
        Ok(report)
    }

    /// List an archive's members without writing anything
    pub fn list_members<R: Read>(&self, reader: R) -> VaultResult<Vec<ArchiveMember>> {
        let mut archive = tar::Archive::new(GzDecoder::new(reader));
        let mut members = Vec::new();

        for entry in archive.entries().map_err(read_error)? {
            check_cancelled(self.cancel.as_ref())?;

            let entry = entry.map_err(read_error)?;
            let header = entry.header();
            let entry_type = header.entry_type();
            let kind = if entry_type.is_dir() {
                EntryKind::Directory
            } else if entry_type.is_file() {
                EntryKind::File
            } else {
                EntryKind::Other
            };

            let relative = relative_member(&entry.path().map_err(read_error)?)?;
            members.push(ArchiveMember {
                path: Path::new("/").join(relative),
                kind,
                mode: header.mode().map_err(read_error)?,
                size: header.size().map_err(read_error)?,
            });
        }

        Ok(members)
    }

    /// List the members of the archive at `source`
    pub fn list_members_of(&self, source: &Path) -> VaultResult<Vec<ArchiveMember>> {
        let file = File::open(source).map_err(|e| {
            VaultError::Io(format!("Failed to open archive {}: {}", source.display(), e))
        })?;
        self.list_members(BufReader::new(file))
    }
}

/// Strip the root from a member path and refuse anything that climbs out of it
fn relative_member(member: &Path) -> VaultResult<PathBuf> {
    let mut relative = PathBuf::new();
    for component in member.components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            Component::ParentDir => {
                return Err(VaultError::Validation(format!(
                    "Archive member escapes the destination: {}",
                    member.display()
                )))
            }
        }
    }
    Ok(relative)
}

#[cfg(unix)]
fn create_dir_tree(path: &Path) -> VaultResult<()> {
    use std::os::unix::fs::DirBuilderExt;

    fs::DirBuilder::new()
        .recursive(true)
        .mode(DIRECTORY_MODE)
        .create(path)
        .map_err(|e| restore_error(path, e))
}

#[cfg(not(unix))]
fn create_dir_tree(path: &Path) -> VaultResult<()> {
    let _ = DIRECTORY_MODE;
    fs::create_dir_all(path).map_err(|e| restore_error(path, e))
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> VaultResult<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777))
        .map_err(|e| restore_error(path, e))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> VaultResult<()> {
    Ok(())
}

fn read_error(e: io::Error) -> VaultError {
    VaultError::Io(format!("Failed to read archive: {}", e))
}

fn restore_error(path: &Path, e: io::Error) -> VaultError {
    VaultError::Io(format!("Failed to restore {}: {}", path.display(), e))
}
