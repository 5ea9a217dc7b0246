//! Backup lifecycle for nodevault
//!
//! Ties the archive engine, the backends and the policy document together
//! into the operations an operator runs.
//!
//! # Architecture
//!
//! - `BackupManager`: creates archives, dispatches them and prunes
//! - `RestoreManager`: resolves an archive and extracts it
//! - `Catalog`: lists, resolves and deletes archives on one backend
//! - `Scheduler`: saves the policy and projects it for the host scheduler
//!
//! # Example
//!
//! ```rust,ignore
//! use nodevault::backup::{BackupManager, CreateOptions, RestoreManager, RestoreOptions, Selector};
//! use nodevault::backend::BackendKind;
//! use nodevault::config::VaultPaths;
//!
//! let paths = VaultPaths::new();
//! let report = BackupManager::new(paths.clone()).create(&CreateOptions::default())?;
//! println!("created {}", report.name);
//!
//! let restore = RestoreManager::new(paths)
//!     .restore(&RestoreOptions::new(BackendKind::Local, Selector::Latest))?;
//! println!("restored {} files", restore.extract.files);
//! ```

mod catalog;
mod manager;
mod restore;
mod retention;
mod schedule;

pub use catalog::{Catalog, Selector};
pub use manager::{BackupManager, CreateOptions, CreatePlan, CreateReport, StatusReport};
pub use restore::{RestoreManager, RestoreOptions, RestorePlan, RestoreReport};
pub use retention::{apply_retention, plan_retention, RetentionReport};
pub use schedule::{ScheduleReport, Scheduler};

use tracing::warn;

use crate::backend::BackendRegistry;
use crate::config::paths::VaultPaths;
use crate::config::policy::{BackupPolicy, PolicyStore};

/// Load the policy for an operation that can run without one
///
/// A missing document yields defaults silently. A malformed one yields
/// defaults plus a warning message for the operator.
pub fn load_policy_or_default(paths: &VaultPaths) -> (BackupPolicy, Option<String>) {
    let store = PolicyStore::new(paths);
    match store.load_optional() {
        Ok(policy) => (policy.unwrap_or_default(), None),
        Err(e) => {
            warn!(path = %store.path().display(), error = %e, "ignoring unreadable backup policy");
            let message = format!("Ignoring backup policy at {}: {}", store.path().display(), e);
            (BackupPolicy::default(), Some(message))
        }
    }
}

/// Backends configured for this node and policy
pub fn registry_for(paths: &VaultPaths, policy: &BackupPolicy) -> BackendRegistry {
    BackendRegistry::from_paths(paths, policy.s3.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_missing_policy_is_default_without_warning() {
        let temp = TempDir::new().unwrap();
        let paths = VaultPaths::with_base_dir(temp.path().to_path_buf());

        let (policy, warning) = load_policy_or_default(&paths);
        assert_eq!(policy, BackupPolicy::default());
        assert!(warning.is_none());
    }

    #[test]
    fn test_malformed_policy_is_default_with_warning() {
        let temp = TempDir::new().unwrap();
        let paths = VaultPaths::with_base_dir(temp.path().to_path_buf());
        fs::create_dir_all(paths.state_dir()).unwrap();
        fs::write(paths.policy_file(), "retention: [oops\n").unwrap();

        let (policy, warning) = load_policy_or_default(&paths);
        assert_eq!(policy, BackupPolicy::default());
        assert!(warning.unwrap().contains("backup.yaml"));
    }
}
