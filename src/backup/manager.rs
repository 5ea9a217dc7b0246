//! Backup manager for nodevault
//!
//! Creates archives of the node's state, mirrors them to the requested
//! backend and enforces the retention limit afterwards.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use super::retention::{apply_retention, plan_retention, RetentionReport};
use super::{load_policy_or_default, registry_for};
use crate::archive::naming::DEFAULT_PREFIX;
use crate::archive::{
    ArchiveBuilder, ArchiveName, BuildReport, CancelFlag, ExclusionMatcher, PathSelector,
    PlannedEntry,
};
use crate::backend::{ArchiveInfo, BackendKind, BackendRegistry, RemovableBackend};
use crate::config::paths::VaultPaths;
use crate::config::policy::{BackupPolicy, PolicyStore};
use crate::error::{VaultError, VaultResult};

/// Exclusions applied to every archive ahead of the policy's own
const BUILTIN_EXCLUDES: [&str; 2] = ["*.log", "*.tmp"];

/// Options for a single create
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    /// Backend the archive is mirrored to; `local` keeps it local only
    pub target: BackendKind,
    /// Also capture the user-data directory, if present
    pub include_data: bool,
    /// Sort directory entries for a reproducible archive
    pub sorted: bool,
}

/// What a create would do
#[derive(Debug, Clone)]
pub struct CreatePlan {
    pub roots: Vec<PathBuf>,
    pub patterns: Vec<String>,
    pub entries: Vec<PlannedEntry>,
    pub target: BackendKind,
    pub warnings: Vec<String>,
}

impl CreatePlan {
    /// Total payload bytes of the planned files
    pub fn total_bytes(&self) -> u64 {
        self.entries.iter().map(|e| e.size).sum()
    }
}

/// Outcome of a create
#[derive(Debug, Clone)]
pub struct CreateReport {
    /// Archive file name
    pub name: String,
    /// Local archive path
    pub path: PathBuf,
    pub build: BuildReport,
    pub target: BackendKind,
    /// Where the target backend stored its copy, if mirroring succeeded
    pub mirror: Option<PathBuf>,
    /// Retention outcome per pruned backend
    pub retention: Vec<(BackendKind, RetentionReport)>,
    /// Non-fatal problems (policy, dispatch, retention)
    pub warnings: Vec<String>,
    pub elapsed: Duration,
}

/// Snapshot of the node's backup configuration and holdings
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub state_dir: PathBuf,
    pub backup_dir: PathBuf,
    pub policy_file: PathBuf,
    /// `None` when no policy has been saved
    pub policy: Option<BackupPolicy>,
    pub policy_error: Option<String>,
    pub local_archives: Vec<ArchiveInfo>,
    pub removable_mount: Option<PathBuf>,
}

/// Manages archive creation and retention
pub struct BackupManager {
    paths: VaultPaths,
    prefix: String,
    cancel: Option<CancelFlag>,
}

impl BackupManager {
    /// Create a new BackupManager
    pub fn new(paths: VaultPaths) -> Self {
        Self {
            paths,
            prefix: DEFAULT_PREFIX.to_string(),
            cancel: None,
        }
    }

    /// Use a different archive name prefix
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Attach a cancel flag to archive builds
    pub fn cancel_flag(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn paths(&self) -> &VaultPaths {
        &self.paths
    }

    /// Roots captured for a policy: state dir, optional data dir, then policy includes
    pub fn roots(&self, policy: &BackupPolicy, include_data: bool) -> Vec<PathBuf> {
        PathSelector::from_paths(&self.paths).select(include_data, &policy.include)
    }

    /// Effective exclusion patterns for a policy, in evaluation order
    pub fn exclusion_patterns(&self, policy: &BackupPolicy) -> Vec<String> {
        let mut patterns = vec![self.paths.backup_dir().display().to_string()];
        patterns.extend(BUILTIN_EXCLUDES.iter().map(|p| p.to_string()));
        patterns.extend(policy.exclude.iter().cloned());
        patterns
    }

    fn builder(&self, policy: &BackupPolicy, sorted: bool) -> ArchiveBuilder {
        let builder = ArchiveBuilder::new(ExclusionMatcher::new(self.exclusion_patterns(policy)))
            .sorted(sorted);
        match &self.cancel {
            Some(flag) => builder.cancel_flag(flag.clone()),
            None => builder,
        }
    }

    /// Work out what a create would capture, without writing anything
    pub fn plan(&self, options: &CreateOptions) -> VaultResult<CreatePlan> {
        let (policy, warning) = load_policy_or_default(&self.paths);
        let roots = self.roots(&policy, options.include_data);
        let entries = self.builder(&policy, options.sorted).plan(&roots)?;

        Ok(CreatePlan {
            patterns: self.exclusion_patterns(&policy),
            roots,
            entries,
            target: options.target,
            warnings: warning.into_iter().collect(),
        })
    }

    /// Create an archive, mirror it and prune
    ///
    /// Only a failure to write the local archive fails the create. Mirroring
    /// and retention problems are logged and returned as warnings.
    pub fn create(&self, options: &CreateOptions) -> VaultResult<CreateReport> {
        let started = Instant::now();
        let (policy, warning) = load_policy_or_default(&self.paths);
        let mut warnings: Vec<String> = warning.into_iter().collect();

        let backup_dir = self.paths.backup_dir();
        fs::create_dir_all(&backup_dir).map_err(|e| {
            VaultError::Io(format!(
                "Failed to create backup directory {}: {}",
                backup_dir.display(),
                e
            ))
        })?;

        let name = ArchiveName::now(self.prefix.clone()).file_name();
        let path = backup_dir.join(&name);
        let roots = self.roots(&policy, options.include_data);
        let build = self.builder(&policy, options.sorted).build_atomic(&path, &roots)?;

        let registry = registry_for(&self.paths, &policy);
        registry.get(BackendKind::Local)?.store(&path, &name)?;

        let mirror = if options.target == BackendKind::Local {
            None
        } else {
            self.dispatch(&registry, options.target, &path, &name, &mut warnings)
        };

        let mut pruned = vec![BackendKind::Local];
        if mirror.is_some() {
            pruned.push(options.target);
        }

        let mut retention = Vec::new();
        for kind in pruned {
            if let Some(report) = self.prune_quietly(&registry, kind, &policy, &mut warnings) {
                retention.push((kind, report));
            }
        }

        Ok(CreateReport {
            name,
            path,
            build,
            target: options.target,
            mirror,
            retention,
            warnings,
            elapsed: started.elapsed(),
        })
    }

    fn dispatch(
        &self,
        registry: &BackendRegistry,
        target: BackendKind,
        path: &Path,
        name: &str,
        warnings: &mut Vec<String>,
    ) -> Option<PathBuf> {
        match registry.get(target).and_then(|b| b.store(path, name)) {
            Ok(location) => {
                info!(backend = %target, location = %location.display(), "archive mirrored");
                Some(location)
            }
            Err(e) => {
                warn!(backend = %target, error = %e, "failed to mirror archive; local copy kept");
                warnings.push(format!("Could not copy archive to {}: {}", target, e));
                None
            }
        }
    }

    fn prune_quietly(
        &self,
        registry: &BackendRegistry,
        kind: BackendKind,
        policy: &BackupPolicy,
        warnings: &mut Vec<String>,
    ) -> Option<RetentionReport> {
        match registry
            .get(kind)
            .and_then(|b| apply_retention(b, policy.retention_limit()))
        {
            Ok(report) => {
                for (name, reason) in &report.failed {
                    warnings.push(format!("Could not prune {} on {}: {}", name, kind, reason));
                }
                Some(report)
            }
            Err(e) => {
                warn!(backend = %kind, error = %e, "retention failed");
                warnings.push(format!("Retention on {} failed: {}", kind, e));
                None
            }
        }
    }

    /// The retention limit and the archives it would delete on a backend
    pub fn plan_prune(&self, kind: BackendKind) -> VaultResult<(Option<usize>, Vec<ArchiveInfo>)> {
        let policy = PolicyStore::new(&self.paths).load_optional()?.unwrap_or_default();
        let limit = policy.retention_limit();
        let Some(max) = limit else {
            return Ok((None, Vec::new()));
        };

        let registry = registry_for(&self.paths, &policy);
        let archives = registry.get(kind)?.list()?;
        let names: Vec<String> = archives.iter().map(|a| a.name.clone()).collect();
        let doomed = plan_retention(&names, max);

        Ok((
            limit,
            archives.into_iter().filter(|a| doomed.contains(&a.name)).collect(),
        ))
    }

    /// Apply the policy's retention limit to one backend
    ///
    /// Unlike the pass that follows a create, a malformed policy fails here.
    pub fn prune(&self, kind: BackendKind) -> VaultResult<RetentionReport> {
        let policy = PolicyStore::new(&self.paths).load_optional()?.unwrap_or_default();
        let registry = registry_for(&self.paths, &policy);
        apply_retention(registry.get(kind)?, policy.retention_limit())
    }

    /// Gather the node's backup status
    pub fn status(&self) -> VaultResult<StatusReport> {
        let store = PolicyStore::new(&self.paths);
        let (policy, policy_error) = match store.load_optional() {
            Ok(policy) => (policy, None),
            Err(e) => (None, Some(e.to_string())),
        };

        let registry = registry_for(&self.paths, &policy.clone().unwrap_or_default());
        let local_archives = registry.get(BackendKind::Local)?.list()?;
        let removable_mount = RemovableBackend::new(self.paths.mount_candidates().to_vec())
            .resolve_mount()
            .ok();

        Ok(StatusReport {
            state_dir: self.paths.state_dir().to_path_buf(),
            backup_dir: self.paths.backup_dir(),
            policy_file: self.paths.policy_file(),
            policy,
            policy_error,
            local_archives,
            removable_mount,
        })
    }
}
