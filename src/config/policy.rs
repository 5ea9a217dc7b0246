//! Backup policy persistence
//!
//! The policy document records whether automatic backups run, on which
//! schedule, how many archives are kept and where they go. It is stored as
//! YAML under the node's state directory and is projected into a one-line
//! job definition for the host's cron facility.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::file_io::{read_yaml, write_atomic, write_yaml_atomic};
use super::paths::VaultPaths;
use crate::backend::BackendKind;
use crate::error::{VaultError, VaultResult};

/// Default cron expression used by `schedule`
pub const DEFAULT_SCHEDULE: &str = "0 2 * * *";

/// Default number of archives kept by `schedule`
pub const DEFAULT_RETENTION: i64 = 7;

/// Object-storage endpoint settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ObjectStoreSettings {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bucket: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub prefix: String,
}

/// Persisted backup policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BackupPolicy {
    /// Whether automatic backups are enabled
    #[serde(default)]
    pub enabled: bool,

    /// Cron expression, opaque to the archive engine
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub schedule: String,

    /// Maximum archives kept per backend; zero or negative disables pruning
    #[serde(default)]
    pub retention: i64,

    /// Backend the scheduled job targets
    #[serde(default)]
    pub target: BackendKind,

    /// Extra root paths, in order (duplicates are kept as written)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,

    /// Extra exclusion patterns, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,

    /// Object-storage settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3: Option<ObjectStoreSettings>,
}

impl BackupPolicy {
    /// Build the policy written by `schedule`
    pub fn scheduled(
        paths: &VaultPaths,
        schedule: impl Into<String>,
        retention: i64,
        target: BackendKind,
    ) -> Self {
        Self {
            enabled: true,
            schedule: schedule.into(),
            retention,
            target,
            include: vec![paths.state_dir().display().to_string()],
            exclude: vec![paths.backup_dir().display().to_string()],
            s3: None,
        }
    }

    /// The pruning limit, or `None` when pruning is disabled
    pub fn retention_limit(&self) -> Option<usize> {
        if self.retention > 0 {
            Some(self.retention as usize)
        } else {
            None
        }
    }

    /// Render the single job line consumed by the host scheduler
    pub fn cron_entry(&self, program: &str) -> String {
        format!(
            "{} root {} create --target={}\n",
            self.schedule, program, self.target
        )
    }
}

/// Loads and saves the policy document
#[derive(Debug, Clone)]
pub struct PolicyStore {
    path: PathBuf,
}

impl PolicyStore {
    /// Create a store for the policy document at its fixed location
    pub fn new(paths: &VaultPaths) -> Self {
        Self {
            path: paths.policy_file(),
        }
    }

    /// Path of the policy document
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the policy
    ///
    /// # Errors
    ///
    /// `NotFound` if no document exists, `Config` if it cannot be parsed.
    pub fn load(&self) -> VaultResult<BackupPolicy> {
        read_yaml(&self.path)?
            .ok_or_else(|| VaultError::policy_not_found(self.path.display().to_string()))
    }

    /// Load the policy, treating a missing document as "no policy"
    pub fn load_optional(&self) -> VaultResult<Option<BackupPolicy>> {
        match self.load() {
            Ok(policy) => Ok(Some(policy)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Persist the policy
    pub fn save(&self, policy: &BackupPolicy) -> VaultResult<()> {
        write_yaml_atomic(&self.path, policy)
    }
}

/// Write the scheduler projection for a policy
pub fn install_cron_entry(path: &Path, policy: &BackupPolicy, program: &str) -> VaultResult<()> {
    write_atomic(path, policy.cron_entry(program).as_bytes())
}

/// Remove the scheduler projection; a missing file is not an error
pub fn remove_cron_entry(path: &Path) -> VaultResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(VaultError::Io(format!(
            "Failed to remove {}: {}",
            path.display(),
            e
        ))),
    }
}
