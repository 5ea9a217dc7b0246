//! Archive naming
//!
//! Archives are named `{prefix}-{hostname}-{YYYY-MM-DD_HH-MM-SS}.tar.gz`.
//! The timestamp format sorts lexicographically in creation order, so a plain
//! name sort of one node's archives is also a chronological sort.

use std::fmt;

use chrono::{Local, NaiveDateTime};

/// File extension shared by every archive
pub const ARCHIVE_EXTENSION: &str = ".tar.gz";

/// strftime format of the embedded timestamp
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Default product prefix
pub const DEFAULT_PREFIX: &str = "nodevault";

const TIMESTAMP_LEN: usize = "YYYY-MM-DD_HH-MM-SS".len();

/// Parsed identity of an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveName {
    pub prefix: String,
    pub hostname: String,
    pub timestamp: NaiveDateTime,
}

impl ArchiveName {
    pub fn new(
        prefix: impl Into<String>,
        hostname: impl Into<String>,
        timestamp: NaiveDateTime,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            hostname: hostname.into(),
            timestamp,
        }
    }

    /// Name an archive for this host at the current local time
    pub fn now(prefix: impl Into<String>) -> Self {
        Self::new(prefix, local_hostname(), Local::now().naive_local())
    }

    /// Parse an archive file name; `None` if it doesn't follow the naming scheme
    pub fn parse(file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(ARCHIVE_EXTENSION)?;
        if stem.len() < TIMESTAMP_LEN + 2 || !stem.is_char_boundary(stem.len() - TIMESTAMP_LEN) {
            return None;
        }

        let (head, stamp) = stem.split_at(stem.len() - TIMESTAMP_LEN);
        let head = head.strip_suffix('-')?;
        let (prefix, hostname) = head.split_once('-')?;
        if prefix.is_empty() || hostname.is_empty() {
            return None;
        }

        let timestamp = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()?;
        Some(Self::new(prefix, hostname, timestamp))
    }

    /// The archive's file name
    pub fn file_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ArchiveName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}{}",
            self.prefix,
            self.hostname,
            self.timestamp.format(TIMESTAMP_FORMAT),
            ARCHIVE_EXTENSION
        )
    }
}

/// True for names a backend should list as archives
///
/// Hidden names are in-progress temporaries and never count.
pub fn is_archive_file_name(name: &str) -> bool {
    name.ends_with(ARCHIVE_EXTENSION) && !name.starts_with('.')
}

/// This node's hostname, or `unknown` when it cannot be determined
pub fn local_hostname() -> String {
    hostname::get()
        .ok()
        .map(|h| h.to_string_lossy().to_string())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
