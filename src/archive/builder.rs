//! Archive construction
//!
//! Streams the selected roots into `file -> gzip -> tar`. Entries are written
//! in walk order, directories as a bare header and regular files as a header
//! followed by their full content.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Component, Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use tar::{Header, HeaderMode};
use tracing::{debug, info, warn};

use super::exclude::ExclusionMatcher;
use super::walk::{walk_roots, EntryKind, WalkErrorPolicy, WalkedEntry};
use super::{check_cancelled, CancelFlag};
use crate::error::{VaultError, VaultResult};

/// Summary of a finished build
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Size of the finished archive on disk
    pub bytes_written: u64,
    /// Regular files captured
    pub files: usize,
    /// Directories captured
    pub directories: usize,
    /// Entries matched by an exclusion pattern
    pub excluded: usize,
    /// Entries skipped because they were unreadable or not a file/directory
    pub skipped: usize,
}

/// An entry a build would capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedEntry {
    pub path: PathBuf,
    pub kind: EntryKind,
    pub size: u64,
}

/// Writes archives from a set of roots
#[derive(Debug, Clone, Default)]
pub struct ArchiveBuilder {
    matcher: ExclusionMatcher,
    sorted: bool,
    error_policy: WalkErrorPolicy,
    cancel: Option<CancelFlag>,
}

impl ArchiveBuilder {
    /// Create a builder that applies the given exclusions
    pub fn new(matcher: ExclusionMatcher) -> Self {
        Self {
            matcher,
            ..Self::default()
        }
    }

    /// Sort each directory's children by name for reproducible archives
    pub fn sorted(mut self, sorted: bool) -> Self {
        self.sorted = sorted;
        self
    }

    /// Choose how unreadable entries are handled (default: skip)
    pub fn error_policy(mut self, policy: WalkErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    /// Attach a cancel flag polled once per entry
    pub fn cancel_flag(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// List the entries a build over `roots` would capture, without writing anything
    pub fn plan(&self, roots: &[PathBuf]) -> VaultResult<Vec<PlannedEntry>> {
        let mut planned = Vec::new();
        let mut report = BuildReport::default();

        self.visit(roots, &[], &mut report, |entry| {
            planned.push(PlannedEntry {
                path: entry.path.clone(),
                kind: entry.kind,
                size: if entry.kind == EntryKind::File {
                    entry.metadata.len()
                } else {
                    0
                },
            });
            Ok(true)
        })?;

        Ok(planned)
    }

    /// Write an archive of `roots` to `destination`
    ///
    /// The destination is created exclusively; an existing file is an error.
    /// Unreadable entries are handled per the error policy, while any failure
    /// writing the destination aborts the build.
    pub fn build(&self, destination: &Path, roots: &[PathBuf]) -> VaultResult<BuildReport> {
        self.build_into(destination, &[destination], roots)
    }

    /// Write an archive under a temporary name, then link it into place
    ///
    /// The final name only ever refers to a complete archive, and an archive
    /// that claims the name first is never replaced. On any failure the
    /// temporary file is removed.
    pub fn build_atomic(&self, destination: &Path, roots: &[PathBuf]) -> VaultResult<BuildReport> {
        if destination.exists() {
            return Err(already_exists(destination));
        }

        let temp = partial_path(destination);
        let report = match self.build_into(&temp, &[temp.as_path(), destination], roots) {
            Ok(report) => report,
            Err(e) => {
                let _ = fs::remove_file(&temp);
                return Err(e);
            }
        };

        publish(&temp, destination)?;

        info!(
            archive = %destination.display(),
            bytes = report.bytes_written,
            files = report.files,
            directories = report.directories,
            "archive created"
        );
        Ok(report)
    }

    fn build_into(
        &self,
        destination: &Path,
        never_capture: &[&Path],
        roots: &[PathBuf],
    ) -> VaultResult<BuildReport> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(destination)
            .map_err(|e| {
                VaultError::Io(format!(
                    "Failed to create archive {}: {}",
                    destination.display(),
                    e
                ))
            })?;

        let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        let mut tar = tar::Builder::new(encoder);
        let mut report = BuildReport::default();

        self.visit(roots, never_capture, &mut report, |entry| {
            append_entry(&mut tar, entry)
        })?;

        // Archive footer, then gzip trailer, then the file itself
        let encoder = tar.into_inner().map_err(write_error)?;
        let writer = encoder.finish().map_err(write_error)?;
        let file = writer
            .into_inner()
            .map_err(|e| write_error(e.into_error()))?;
        file.sync_all().map_err(write_error)?;

        report.bytes_written = file.metadata().map_err(write_error)?.len();
        Ok(report)
    }

    /// Drive the walk, applying cancellation, error policy, exclusions and
    /// de-duplication, and hand each surviving entry to `capture`
    ///
    /// `capture` returns `false` when it had to skip the entry.
    fn visit<F>(
        &self,
        roots: &[PathBuf],
        never_capture: &[&Path],
        report: &mut BuildReport,
        mut capture: F,
    ) -> VaultResult<()>
    where
        F: FnMut(&WalkedEntry) -> VaultResult<bool>,
    {
        let mut seen: HashSet<PathBuf> = HashSet::new();

        for result in walk_roots(roots, self.sorted) {
            check_cancelled(self.cancel.as_ref())?;

            let entry = match result {
                Ok(entry) => entry,
                Err(e) => match self.error_policy {
                    WalkErrorPolicy::Skip => {
                        debug!(error = %e, "skipping unreadable entry");
                        report.skipped += 1;
                        continue;
                    }
                    WalkErrorPolicy::Abort => return Err(e.into()),
                },
            };

            if never_capture.iter().any(|p| *p == entry.path.as_path()) {
                continue;
            }

            if let Some(pattern) = self
                .matcher
                .matching_pattern(&entry.base_name(), &entry.path.to_string_lossy())
            {
                debug!(path = %entry.path.display(), %pattern, "excluded");
                report.excluded += 1;
                continue;
            }

            if entry.kind == EntryKind::Other {
                debug!(path = %entry.path.display(), "skipping non-regular entry");
                report.skipped += 1;
                continue;
            }

            // Overlapping roots would otherwise capture the same entry twice
            if !seen.insert(entry.path.clone()) {
                continue;
            }

            if capture(&entry)? {
                match entry.kind {
                    EntryKind::Directory => report.directories += 1,
                    _ => report.files += 1,
                }
            } else {
                report.skipped += 1;
            }
        }

        Ok(())
    }
}

fn append_entry<W: Write>(tar: &mut tar::Builder<W>, entry: &WalkedEntry) -> VaultResult<bool> {
    let member = member_path(&entry.path);
    if member.as_os_str().is_empty() {
        warn!(path = %entry.path.display(), "cannot archive the filesystem root itself");
        return Ok(false);
    }

    match entry.kind {
        EntryKind::Directory => {
            let mut header = Header::new_gnu();
            header.set_metadata_in_mode(&entry.metadata, HeaderMode::Complete);
            header.set_size(0);
            tar.append_data(&mut header, &member, io::empty())
                .map_err(|e| archive_error(&entry.path, e))?;
            Ok(true)
        }
        EntryKind::File => {
            let file = match File::open(&entry.path) {
                Ok(file) => file,
                Err(e) => {
                    debug!(path = %entry.path.display(), error = %e, "skipping unreadable file");
                    return Ok(false);
                }
            };
            let metadata = file.metadata().unwrap_or_else(|_| entry.metadata.clone());
            let size = metadata.len();

            let mut header = Header::new_gnu();
            header.set_metadata_in_mode(&metadata, HeaderMode::Complete);

            // A file that shrinks while being read is zero-padded to the recorded size
            let data = file.take(size).chain(io::repeat(0)).take(size);
            tar.append_data(&mut header, &member, data)
                .map_err(|e| archive_error(&entry.path, e))?;
            Ok(true)
        }
        EntryKind::Other => Ok(false),
    }
}

/// The member name recorded for a captured path: the absolute path without its root
fn member_path(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
        .collect()
}

fn partial_path(destination: &Path) -> PathBuf {
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    destination.with_file_name(format!(".{}.{}.partial", name, uuid::Uuid::new_v4()))
}

/// Give a finished temporary archive its final name
///
/// A hard link fails with `AlreadyExists` where a rename would silently
/// replace the other archive. The temporary name is removed either way.
fn publish(temp: &Path, destination: &Path) -> VaultResult<()> {
    let linked = fs::hard_link(temp, destination);
    if let Err(e) = fs::remove_file(temp) {
        warn!(path = %temp.display(), error = %e, "failed to remove temporary archive");
    }

    match linked {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(already_exists(destination)),
        Err(e) => Err(VaultError::Io(format!(
            "Failed to move archive into place at {}: {}",
            destination.display(),
            e
        ))),
    }
}

fn already_exists(destination: &Path) -> VaultError {
    VaultError::Io(format!("Archive already exists: {}", destination.display()))
}

fn write_error(e: io::Error) -> VaultError {
    VaultError::Io(format!("Failed to write archive: {}", e))
}

fn archive_error(path: &Path, e: io::Error) -> VaultError {
    VaultError::Io(format!("Failed to archive {}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use tempfile::TempDir;

    fn members(archive: &Path) -> Vec<String> {
        let file = File::open(archive).unwrap();
        let mut tar = tar::Archive::new(GzDecoder::new(file));
        tar.entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().to_string())
            .collect()
    }

    fn member_of(path: &Path) -> String {
        member_path(path).to_string_lossy().to_string()
    }

    #[test]
    fn test_excluded_suffix_not_archived() {
        let temp = TempDir::new().unwrap();
        let state = temp.path().join("state");
        fs::create_dir_all(&state).unwrap();
        fs::write(state.join("a.txt"), b"alpha").unwrap();
        fs::write(state.join("b.log"), b"noise").unwrap();

        let dest = temp.path().join("out.tar.gz");
        let builder = ArchiveBuilder::new(ExclusionMatcher::new(["*.log"]));
        let report = builder.build(&dest, &[state.clone()]).unwrap();

        let names = members(&dest);
        assert!(names.contains(&member_of(&state.join("a.txt"))));
        assert!(!names.iter().any(|n| n.ends_with("b.log")));
        assert_eq!(report.files, 1);
        assert_eq!(report.directories, 1);
        assert_eq!(report.excluded, 1);
        assert!(report.bytes_written > 0);
    }

    #[test]
    fn test_members_are_rootless_absolute_paths() {
        let temp = TempDir::new().unwrap();
        let state = temp.path().join("state");
        fs::create_dir_all(&state).unwrap();
        fs::write(state.join("id"), b"x").unwrap();

        let dest = temp.path().join("out.tar.gz");
        ArchiveBuilder::default().build(&dest, &[state.clone()]).unwrap();

        for name in members(&dest) {
            assert!(!name.starts_with('/'));
        }
        assert!(members(&dest).contains(&member_of(&state.join("id"))));
    }

    #[test]
    fn test_substring_exclusion_covers_subtree() {
        let temp = TempDir::new().unwrap();
        let state = temp.path().join("state");
        let backups = state.join("backups");
        fs::create_dir_all(&backups).unwrap();
        fs::write(backups.join("old.tar.gz"), b"old").unwrap();
        fs::write(state.join("token"), b"t").unwrap();

        let dest = temp.path().join("out.tar.gz");
        let builder =
            ArchiveBuilder::new(ExclusionMatcher::new([backups.to_string_lossy().to_string()]));
        builder.build(&dest, &[state.clone()]).unwrap();

        let names = members(&dest);
        assert!(!names.iter().any(|n| n.contains("backups")));
        assert!(names.contains(&member_of(&state.join("token"))));
    }

    #[test]
    fn test_overlapping_roots_capture_once() {
        let temp = TempDir::new().unwrap();
        let state = temp.path().join("state");
        fs::create_dir_all(state.join("mesh")).unwrap();
        fs::write(state.join("mesh").join("peer.key"), b"k").unwrap();

        let dest = temp.path().join("out.tar.gz");
        let roots = vec![state.clone(), state.join("mesh"), state.clone()];
        let report = ArchiveBuilder::default().build(&dest, &roots).unwrap();

        let key = member_of(&state.join("mesh").join("peer.key"));
        assert_eq!(members(&dest).iter().filter(|n| **n == key).count(), 1);
        assert_eq!(report.files, 1);
    }

    #[test]
    fn test_destination_inside_root_not_captured() {
        let temp = TempDir::new().unwrap();
        let state = temp.path().join("state");
        fs::create_dir_all(&state).unwrap();
        fs::write(state.join("config"), b"c").unwrap();

        let dest = state.join("snapshot.tar.gz");
        ArchiveBuilder::default().build(&dest, &[state.clone()]).unwrap();

        assert!(!members(&dest).iter().any(|n| n.ends_with("snapshot.tar.gz")));
    }

    #[test]
    fn test_existing_destination_is_error() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("out.tar.gz");
        fs::write(&dest, b"taken").unwrap();

        let err = ArchiveBuilder::default()
            .build(&dest, &[temp.path().to_path_buf()])
            .unwrap_err();
        assert!(matches!(err, VaultError::Io(_)));
        assert_eq!(fs::read(&dest).unwrap(), b"taken");
    }

    #[test]
    fn test_missing_root_skipped_by_default() {
        let temp = TempDir::new().unwrap();
        let state = temp.path().join("state");
        fs::create_dir_all(&state).unwrap();
        fs::write(state.join("f"), b"f").unwrap();

        let dest = temp.path().join("out.tar.gz");
        let roots = vec![temp.path().join("gone"), state];
        let report = ArchiveBuilder::default().build(&dest, &roots).unwrap();
        assert_eq!(report.files, 1);
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn test_abort_policy_fails_on_unreadable_entry() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("out.tar.gz");
        let roots = vec![temp.path().join("gone")];

        let err = ArchiveBuilder::default()
            .error_policy(WalkErrorPolicy::Abort)
            .build(&dest, &roots)
            .unwrap_err();
        assert!(matches!(err, VaultError::Io(_)));
    }

    #[test]
    fn test_build_atomic_leaves_no_partial() {
        let temp = TempDir::new().unwrap();
        let state = temp.path().join("state");
        let out = temp.path().join("out");
        fs::create_dir_all(&state).unwrap();
        fs::create_dir_all(&out).unwrap();
        fs::write(state.join("f"), b"f").unwrap();

        let dest = out.join("n-h-2024-01-01_00-00-00.tar.gz");
        ArchiveBuilder::default().build_atomic(&dest, &[state.clone()]).unwrap();

        let names: Vec<String> = fs::read_dir(&out)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["n-h-2024-01-01_00-00-00.tar.gz".to_string()]);

        // Same name again (same-second collision)
        let err = ArchiveBuilder::default()
            .build_atomic(&dest, &[state])
            .unwrap_err();
        assert!(matches!(err, VaultError::Io(_)));
        assert_eq!(fs::read_dir(&out).unwrap().count(), 1);
    }

    #[test]
    fn test_cancelled_build_leaves_nothing() {
        let temp = TempDir::new().unwrap();
        let state = temp.path().join("state");
        let out = temp.path().join("out");
        fs::create_dir_all(&state).unwrap();
        fs::create_dir_all(&out).unwrap();

        let flag = CancelFlag::new();
        flag.cancel();

        let dest = out.join("a.tar.gz");
        let err = ArchiveBuilder::default()
            .cancel_flag(flag)
            .build_atomic(&dest, &[state])
            .unwrap_err();
        assert!(matches!(err, VaultError::Cancelled));
        assert_eq!(fs::read_dir(&out).unwrap().count(), 0);
    }

    #[test]
    fn test_sorted_build_is_reproducible_in_order() {
        let temp = TempDir::new().unwrap();
        let state = temp.path().join("state");
        fs::create_dir_all(&state).unwrap();
        for name in ["zeta", "alpha", "mid"] {
            fs::write(state.join(name), name).unwrap();
        }

        let first = temp.path().join("1.tar.gz");
        let second = temp.path().join("2.tar.gz");
        let builder = ArchiveBuilder::default().sorted(true);
        builder.build(&first, &[state.clone()]).unwrap();
        builder.build(&second, &[state.clone()]).unwrap();

        let names = members(&first);
        assert_eq!(names, members(&second));
        assert!(names[1].ends_with("alpha"));
        assert!(names[3].ends_with("zeta"));
    }

    #[test]
    fn test_plan_matches_build() {
        let temp = TempDir::new().unwrap();
        let state = temp.path().join("state");
        fs::create_dir_all(state.join("sub")).unwrap();
        fs::write(state.join("sub").join("a"), b"12345").unwrap();
        fs::write(state.join("x.tmp"), b"t").unwrap();

        let builder = ArchiveBuilder::new(ExclusionMatcher::new(["*.tmp"]));
        let plan = builder.plan(&[state.clone()]).unwrap();

        assert_eq!(plan.len(), 3);
        let file = plan.iter().find(|p| p.kind == EntryKind::File).unwrap();
        assert_eq!(file.size, 5);
        assert!(!plan.iter().any(|p| p.path.ends_with("x.tmp")));
    }

    #[test]
    fn test_publish_never_replaces_existing_archive() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("n-h-2024-01-01_00-00-00.tar.gz");
        let partial = partial_path(&dest);
        fs::write(&dest, b"first").unwrap();
        fs::write(&partial, b"second").unwrap();

        let err = publish(&partial, &dest).unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert_eq!(fs::read(&dest).unwrap(), b"first");
        assert!(!partial.exists());
    }

    #[test]
    fn test_publish_moves_partial_into_place() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("n-h-2024-01-01_00-00-00.tar.gz");
        let partial = partial_path(&dest);
        fs::write(&partial, b"archive").unwrap();

        publish(&partial, &dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"archive");
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 1);
    }
}
