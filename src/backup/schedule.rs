//! Automatic backup scheduling
//!
//! Saving a schedule writes the policy document and projects it into a
//! single cron job line. The projection is only ever written, never read
//! back.

use std::path::PathBuf;

use tracing::{info, warn};

use crate::backend::BackendKind;
use crate::config::paths::VaultPaths;
use crate::config::policy::{install_cron_entry, remove_cron_entry, BackupPolicy, PolicyStore};
use crate::error::VaultResult;

/// Outcome of a schedule change
#[derive(Debug, Clone)]
pub struct ScheduleReport {
    pub policy: BackupPolicy,
    pub policy_file: PathBuf,
    pub cron_file: PathBuf,
    /// Whether the cron projection now matches the policy
    pub cron_updated: bool,
    pub warnings: Vec<String>,
}

/// Saves the backup policy and keeps the cron projection in step
pub struct Scheduler {
    paths: VaultPaths,
    program: String,
}

impl Scheduler {
    /// `program` is the command the cron job runs
    pub fn new(paths: VaultPaths, program: impl Into<String>) -> Self {
        Self {
            paths,
            program: program.into(),
        }
    }

    /// Enable automatic backups
    ///
    /// Object-storage settings already in the policy are kept; everything
    /// else is replaced.
    pub fn enable(
        &self,
        schedule: &str,
        retention: i64,
        target: BackendKind,
    ) -> VaultResult<ScheduleReport> {
        let store = PolicyStore::new(&self.paths);
        let existing = store.load_optional().ok().flatten();

        let mut policy = BackupPolicy::scheduled(&self.paths, schedule, retention, target);
        policy.s3 = existing.and_then(|p| p.s3);
        store.save(&policy)?;
        info!(schedule = %policy.schedule, retention, target = %target, "backup schedule saved");

        let mut warnings = Vec::new();
        let cron_file = self.paths.cron_file().to_path_buf();
        let cron_updated = match install_cron_entry(&cron_file, &policy, &self.program) {
            Ok(()) => true,
            Err(e) => {
                warn!(path = %cron_file.display(), error = %e, "failed to write cron job");
                warnings.push(format!("Could not write cron job {}: {}", cron_file.display(), e));
                false
            }
        };

        Ok(ScheduleReport {
            policy,
            policy_file: store.path().to_path_buf(),
            cron_file,
            cron_updated,
            warnings,
        })
    }

    /// Disable automatic backups, keeping the rest of the policy
    pub fn disable(&self) -> VaultResult<ScheduleReport> {
        let store = PolicyStore::new(&self.paths);
        let mut policy = store.load_optional()?.unwrap_or_default();
        policy.enabled = false;
        store.save(&policy)?;
        info!("backup schedule disabled");

        let mut warnings = Vec::new();
        let cron_file = self.paths.cron_file().to_path_buf();
        let cron_updated = match remove_cron_entry(&cron_file) {
            Ok(()) => true,
            Err(e) => {
                warn!(path = %cron_file.display(), error = %e, "failed to remove cron job");
                warnings.push(e.to_string());
                false
            }
        };

        Ok(ScheduleReport {
            policy,
            policy_file: store.path().to_path_buf(),
            cron_file,
            cron_updated,
            warnings,
        })
    }
}
