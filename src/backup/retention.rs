//! Retention enforcement
//!
//! Each backend keeps at most `limit` archives. Names sort in creation order,
//! so pruning deletes from the front of the ascending listing.

use tracing::{info, warn};

use crate::backend::Backend;
use crate::error::VaultResult;

/// Outcome of a retention pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionReport {
    /// Archives removed, oldest first
    pub deleted: Vec<String>,
    /// Archives that could not be removed, with the reason
    pub failed: Vec<(String, String)>,
    /// Archives left on the backend
    pub kept: usize,
}

/// Names to delete so that at most `limit` remain, oldest first
pub fn plan_retention(names: &[String], limit: usize) -> Vec<String> {
    let mut sorted: Vec<&String> = names.iter().collect();
    sorted.sort();

    let excess = sorted.len().saturating_sub(limit);
    sorted.into_iter().take(excess).cloned().collect()
}

/// Prune a backend down to `limit` archives
///
/// `None` disables pruning and leaves the backend untouched. Listing
/// failures propagate; individual deletion failures are recorded in the
/// report and the pass continues.
pub fn apply_retention(
    backend: &dyn Backend,
    limit: Option<usize>,
) -> VaultResult<RetentionReport> {
    let Some(limit) = limit else {
        return Ok(RetentionReport::default());
    };

    let names: Vec<String> = backend.list()?.into_iter().map(|a| a.name).collect();
    let doomed = plan_retention(&names, limit);
    let mut report = RetentionReport::default();

    for name in doomed {
        match backend.delete(&name) {
            Ok(()) => {
                info!(backend = %backend.kind(), archive = %name, "pruned archive");
                report.deleted.push(name);
            }
            Err(e) => {
                warn!(
                    backend = %backend.kind(),
                    archive = %name,
                    error = %e,
                    "failed to prune archive"
                );
                report.failed.push((name, e.to_string()));
            }
        }
    }

    report.kept = names.len() - report.deleted.len();
    Ok(report)
}
