//! Archive catalog
//!
//! Read-side lookups over a single backend. Every call re-reads the backend;
//! nothing is cached between calls.

use std::fmt;

use crate::backend::{ArchiveInfo, Backend};
use crate::error::{VaultError, VaultResult};

/// How to pick one archive out of a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// The greatest name, i.e. the most recent archive
    Latest,
    /// The first archive, in ascending order, whose name contains the token
    Date(String),
    /// An archive with exactly this name
    Name(String),
}

impl Selector {
    /// Build a selector from command-line style arguments
    ///
    /// An explicit name wins over a date, and a date over `latest`.
    pub fn from_args(name: Option<String>, date: Option<String>, latest: bool) -> Option<Self> {
        match (name, date) {
            (Some(name), _) => Some(Self::Name(name)),
            (None, Some(date)) => Some(Self::Date(date)),
            (None, None) if latest => Some(Self::Latest),
            (None, None) => None,
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => write!(f, "latest"),
            Self::Date(token) => write!(f, "date {}", token),
            Self::Name(name) => write!(f, "{}", name),
        }
    }
}

/// Catalog over one backend
pub struct Catalog<'a> {
    backend: &'a dyn Backend,
}

impl<'a> Catalog<'a> {
    pub fn new(backend: &'a dyn Backend) -> Self {
        Self { backend }
    }

    /// All archives, ascending by name
    pub fn list(&self) -> VaultResult<Vec<ArchiveInfo>> {
        let mut archives = self.backend.list()?;
        archives.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(archives)
    }

    /// All archive names, ascending
    pub fn names(&self) -> VaultResult<Vec<String>> {
        Ok(self.list()?.into_iter().map(|a| a.name).collect())
    }

    /// Resolve a selector to a single archive
    pub fn resolve(&self, selector: &Selector) -> VaultResult<ArchiveInfo> {
        let archives = self.list()?;
        if archives.is_empty() {
            return Err(VaultError::archive_not_found(format!(
                "no backups on {}",
                self.backend.kind()
            )));
        }

        let found = match selector {
            Selector::Latest => archives.into_iter().last(),
            Selector::Date(token) => archives.into_iter().find(|a| a.name.contains(token.as_str())),
            Selector::Name(name) => archives.into_iter().find(|a| &a.name == name),
        };

        found.ok_or_else(|| VaultError::archive_not_found(selector.to_string()))
    }

    /// Delete one archive by name
    pub fn delete(&self, name: &str) -> VaultResult<()> {
        self.backend.delete(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{LocalBackend, RemovableBackend};
    use std::fs;
    use tempfile::TempDir;

    const NAMES: [&str; 4] = [
        "nodevault-edge-2024-01-04_02-00-00.tar.gz",
        "nodevault-edge-2024-01-05_02-00-00.tar.gz",
        "nodevault-edge-2024-01-05_14-30-00.tar.gz",
        "nodevault-edge-2024-01-06_02-00-00.tar.gz",
    ];

    fn populated() -> (TempDir, LocalBackend) {
        let temp = TempDir::new().unwrap();
        // Written out of order on purpose
        for name in NAMES.iter().rev() {
            fs::write(temp.path().join(name), b"x").unwrap();
        }
        let backend = LocalBackend::new(temp.path().to_path_buf());
        (temp, backend)
    }

    #[test]
    fn test_list_is_ascending() {
        let (_temp, backend) = populated();
        let names = Catalog::new(&backend).names().unwrap();
        assert_eq!(names, NAMES.to_vec());
    }

    #[test]
    fn test_resolve_latest() {
        let (_temp, backend) = populated();
        let found = Catalog::new(&backend).resolve(&Selector::Latest).unwrap();
        assert_eq!(found.name, NAMES[3]);
    }

    #[test]
    fn test_resolve_date_takes_first_match() {
        let (_temp, backend) = populated();
        let catalog = Catalog::new(&backend);

        let found = catalog.resolve(&Selector::Date("2024-01-05".into())).unwrap();
        assert_eq!(found.name, NAMES[1]);

        let err = catalog.resolve(&Selector::Date("2023-12-31".into())).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_resolve_name() {
        let (_temp, backend) = populated();
        let catalog = Catalog::new(&backend);

        assert_eq!(catalog.resolve(&Selector::Name(NAMES[2].into())).unwrap().name, NAMES[2]);
        assert!(catalog
            .resolve(&Selector::Name("nodevault-edge-2024-01-05".into()))
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_empty_backend_is_not_found() {
        let temp = TempDir::new().unwrap();
        let backend = LocalBackend::new(temp.path().to_path_buf());
        let err = Catalog::new(&backend).resolve(&Selector::Latest).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_unavailable_backend_propagates() {
        let temp = TempDir::new().unwrap();
        let backend = RemovableBackend::new(vec![temp.path().join("absent")]);
        let err = Catalog::new(&backend).resolve(&Selector::Latest).unwrap_err();
        assert!(err.is_unavailable());
    }

    #[test]
    fn test_delete() {
        let (_temp, backend) = populated();
        let catalog = Catalog::new(&backend);

        catalog.delete(NAMES[0]).unwrap();
        assert_eq!(catalog.names().unwrap().len(), 3);
        assert!(catalog.delete(NAMES[0]).unwrap_err().is_not_found());
    }

    #[test]
    fn test_selector_from_args() {
        assert_eq!(
            Selector::from_args(Some("a".into()), Some("d".into()), true),
            Some(Selector::Name("a".into()))
        );
        assert_eq!(
            Selector::from_args(None, Some("2024-01-05".into()), true),
            Some(Selector::Date("2024-01-05".into()))
        );
        assert_eq!(Selector::from_args(None, None, true), Some(Selector::Latest));
        assert_eq!(Selector::from_args(None, None, false), None);
    }
}
