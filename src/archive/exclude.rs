//! Exclusion matching
//!
//! The pattern language is deliberately small:
//!
//! - `*X` matches any entry whose base name ends with `X`
//! - anything else matches any entry whose full path contains it
//!
//! There is no negation, no directory scoping and no `**`.

use std::fmt;
use std::path::Path;

/// A single exclusion pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExclusionPattern {
    /// Matches when the full path contains the string
    Substring(String),
    /// Matches when the base name ends with the suffix (written `*suffix`)
    Suffix(String),
}

impl ExclusionPattern {
    /// Parse a pattern; empty patterns are rejected since they would match everything
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty() {
            return None;
        }
        match raw.strip_prefix('*') {
            Some(suffix) => Some(Self::Suffix(suffix.to_string())),
            None => Some(Self::Substring(raw.to_string())),
        }
    }

    /// Check a single entry against this pattern
    pub fn matches(&self, base_name: &str, full_path: &str) -> bool {
        match self {
            Self::Substring(needle) => full_path.contains(needle.as_str()),
            Self::Suffix(suffix) => base_name.ends_with(suffix.as_str()),
        }
    }
}

impl fmt::Display for ExclusionPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Substring(s) => write!(f, "{}", s),
            Self::Suffix(s) => write!(f, "*{}", s),
        }
    }
}

/// Decides whether a filesystem entry is omitted from an archive
#[derive(Debug, Clone, Default)]
pub struct ExclusionMatcher {
    patterns: Vec<ExclusionPattern>,
}

impl ExclusionMatcher {
    /// Build a matcher from raw pattern strings, in order
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .filter_map(|p| ExclusionPattern::parse(p.as_ref()))
                .collect(),
        }
    }

    /// The configured patterns
    pub fn patterns(&self) -> &[ExclusionPattern] {
        &self.patterns
    }

    /// First pattern matching the entry, if any
    pub fn matching_pattern(&self, base_name: &str, full_path: &str) -> Option<&ExclusionPattern> {
        self.patterns
            .iter()
            .find(|p| p.matches(base_name, full_path))
    }

    /// True if any pattern matches the entry
    pub fn is_excluded(&self, base_name: &str, full_path: &str) -> bool {
        self.matching_pattern(base_name, full_path).is_some()
    }

    /// Convenience wrapper deriving the base name from the path
    pub fn is_excluded_path(&self, path: &Path) -> bool {
        let base_name = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        self.is_excluded(&base_name, &path.to_string_lossy())
    }
}
