//! Archive engine for nodevault
//!
//! Turns a set of root directories into a single gzip-compressed tar stream
//! and back again.
//!
//! # Components
//!
//! - `PathSelector`: decides which roots a backup captures
//! - `ExclusionMatcher`: decides which entries are left out
//! - `ArchiveBuilder`: walks the roots and writes the archive
//! - `ArchiveExtractor`: reads an archive and recreates its entries
//!
//! # Format
//!
//! Archives are plain POSIX tar streams (GNU headers for long names) wrapped
//! in gzip, so `tar -tzf` can inspect any of them. Each member records its
//! captured absolute path without the leading `/`, its permission bits, size,
//! kind and modification time.

mod builder;
mod exclude;
mod extractor;
pub mod naming;
mod select;
mod walk;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use builder::{ArchiveBuilder, BuildReport, PlannedEntry};
pub use exclude::{ExclusionMatcher, ExclusionPattern};
pub use extractor::{ArchiveExtractor, ArchiveMember, ExtractReport};
pub use naming::ArchiveName;
pub use select::PathSelector;
pub use walk::{walk_roots, EntryKind, WalkErrorPolicy, WalkedEntry};

use crate::error::{VaultError, VaultResult};

/// Shared flag for cooperative cancellation of long-running archive work
///
/// Builders and extractors poll it once per entry.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

fn check_cancelled(flag: Option<&CancelFlag>) -> VaultResult<()> {
    match flag {
        Some(flag) if flag.is_cancelled() => Err(VaultError::Cancelled),
        _ => Ok(()),
    }
}
