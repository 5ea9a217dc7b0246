//! Directory traversal over the selected roots
//!
//! The walk is a stream of per-entry results. Whether an unreadable entry
//! aborts the caller or is skipped is the caller's choice, expressed through
//! [`WalkErrorPolicy`].

use std::fs::Metadata;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// What to do with an entry the walk could not read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WalkErrorPolicy {
    /// Log and continue with the next entry
    #[default]
    Skip,
    /// Stop the whole operation with an I/O error
    Abort,
}

/// Kind of filesystem object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
    /// Symlinks, sockets, devices and FIFOs; never archived
    Other,
}

impl EntryKind {
    fn of(metadata: &Metadata) -> Self {
        let file_type = metadata.file_type();
        if file_type.is_dir() {
            Self::Directory
        } else if file_type.is_file() {
            Self::File
        } else {
            Self::Other
        }
    }
}

/// An entry discovered by the walk
#[derive(Debug, Clone)]
pub struct WalkedEntry {
    pub path: PathBuf,
    pub kind: EntryKind,
    pub metadata: Metadata,
}

impl WalkedEntry {
    /// Base name as used by the exclusion matcher
    pub fn base_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// Walk every root in order, depth-first, without following symlinks
///
/// Entries come out in filesystem order unless `sorted` is set, in which case
/// each directory's children are sorted by file name.
pub fn walk_roots<'a>(
    roots: &'a [PathBuf],
    sorted: bool,
) -> impl Iterator<Item = Result<WalkedEntry, walkdir::Error>> + 'a {
    roots.iter().flat_map(move |root| walk_root(root, sorted))
}

fn walk_root(
    root: &Path,
    sorted: bool,
) -> impl Iterator<Item = Result<WalkedEntry, walkdir::Error>> {
    let mut walker = WalkDir::new(root).follow_links(false);
    if sorted {
        walker = walker.sort_by_file_name();
    }

    walker.into_iter().map(|entry| {
        let entry = entry?;
        let metadata = entry.metadata()?;
        Ok(WalkedEntry {
            path: entry.into_path(),
            kind: EntryKind::of(&metadata),
            metadata,
        })
    })
}
