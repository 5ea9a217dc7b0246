//! Backup CLI commands
//!
//! Implements the operator-facing commands. Results go to stdout; diagnostics
//! go through tracing to stderr.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use clap::Subcommand;

use crate::archive::{ArchiveMember, EntryKind};
use crate::backend::{ArchiveInfo, BackendKind};
use crate::backup::{
    load_policy_or_default, registry_for, BackupManager, Catalog, CreateOptions, RestoreManager,
    RestoreOptions, Scheduler, Selector,
};
use crate::config::paths::VaultPaths;
use crate::config::policy::{DEFAULT_RETENTION, DEFAULT_SCHEDULE};
use crate::error::{VaultError, VaultResult};

/// Command the cron job runs when the binary's own path is unknown
const FALLBACK_PROGRAM: &str = "/usr/bin/nodevault";

/// Backup subcommands
#[derive(Subcommand)]
pub enum BackupCommands {
    /// Create a new backup
    Create {
        /// Also copy the archive to this backend
        #[arg(long, value_enum, default_value_t = BackendKind::Local)]
        target: BackendKind,

        /// Include the user-data directory
        #[arg(long)]
        include_data: bool,

        /// Show what would be archived without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Sort entries by name for a reproducible archive
        #[arg(long)]
        sorted: bool,
    },

    /// Restore from a backup
    Restore {
        /// Backup file name
        #[arg(conflicts_with_all = ["date", "latest"])]
        name: Option<String>,

        /// Backend to restore from
        #[arg(long, value_enum, default_value_t = BackendKind::Local)]
        from: BackendKind,

        /// Restore the first backup whose name contains this date (YYYY-MM-DD)
        #[arg(long, conflicts_with = "latest")]
        date: Option<String>,

        /// Restore the most recent backup
        #[arg(long)]
        latest: bool,

        /// Root under which captured paths are recreated
        #[arg(long, default_value = "/")]
        dest: PathBuf,

        /// List what would be restored without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// List all available backups
    List {
        /// Backend to list
        #[arg(long, value_enum, default_value_t = BackendKind::Local)]
        from: BackendKind,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,

        /// Show detailed information
        #[arg(short, long)]
        verbose: bool,
    },

    /// Delete a backup
    Delete {
        /// Backup file name
        name: String,

        /// Backend holding the backup
        #[arg(long, value_enum, default_value_t = BackendKind::Local)]
        from: BackendKind,
    },

    /// Show backup configuration and local backups
    Status,

    /// Configure automatic backups
    Schedule {
        /// Cron expression
        #[arg(long, default_value = DEFAULT_SCHEDULE)]
        cron: String,

        /// Number of backups to keep (0 keeps everything)
        #[arg(long, default_value_t = DEFAULT_RETENTION, allow_negative_numbers = true)]
        retention: i64,

        /// Backend the scheduled job copies to
        #[arg(long, value_enum, default_value_t = BackendKind::Local)]
        target: BackendKind,

        /// Turn automatic backups off
        #[arg(long)]
        disable: bool,
    },

    /// Delete old backups according to retention policy
    Prune {
        /// Backend to prune
        #[arg(long, value_enum, default_value_t = BackendKind::Local)]
        from: BackendKind,

        /// Actually delete (otherwise only a preview is shown)
        #[arg(short, long)]
        force: bool,

        /// Show what would be deleted
        #[arg(long)]
        dry_run: bool,
    },
}

/// Handle a backup command
pub fn handle_backup_command(paths: &VaultPaths, cmd: BackupCommands) -> VaultResult<()> {
    match cmd {
        BackupCommands::Create {
            target,
            include_data,
            dry_run,
            sorted,
        } => {
            let options = CreateOptions {
                target,
                include_data,
                sorted,
            };
            if dry_run {
                create_dry_run(paths, &options)
            } else {
                create(paths, &options)
            }
        }

        BackupCommands::Restore {
            name,
            from,
            date,
            latest,
            dest,
            dry_run,
            yes,
        } => restore(paths, from, Selector::from_args(name, date, latest), dest, dry_run, yes),

        BackupCommands::List {
            from,
            json,
            verbose,
        } => list(paths, from, json, verbose),

        BackupCommands::Delete { name, from } => {
            let (policy, _) = load_policy_or_default(paths);
            let registry = registry_for(paths, &policy);
            Catalog::new(registry.get(from)?).delete(&name)?;
            println!("Deleted backup: {}", name);
            Ok(())
        }

        BackupCommands::Status => status(paths),

        BackupCommands::Schedule {
            cron,
            retention,
            target,
            disable,
        } => schedule(paths, &cron, retention, target, disable),

        BackupCommands::Prune {
            from,
            force,
            dry_run,
        } => prune(paths, from, force && !dry_run),
    }
}

fn create(paths: &VaultPaths, options: &CreateOptions) -> VaultResult<()> {
    println!("Creating backup...");
    let report = BackupManager::new(paths.clone()).create(options)?;

    println!("Backup created: {}", report.name);
    println!("Location: {}", report.path.display());
    println!(
        "Size: {} ({} files, {} directories, {} excluded) in {:.1}s",
        format_size(report.build.bytes_written),
        report.build.files,
        report.build.directories,
        report.build.excluded,
        report.elapsed.as_secs_f64()
    );
    if report.build.skipped > 0 {
        println!("Skipped {} unreadable or special entries", report.build.skipped);
    }

    if let Some(mirror) = &report.mirror {
        println!("Copied to {}: {}", report.target, mirror.display());
    }

    for (kind, retention) in &report.retention {
        if !retention.deleted.is_empty() {
            println!(
                "Pruned {} old backup(s) from {}",
                retention.deleted.len(),
                kind
            );
        }
    }

    for warning in &report.warnings {
        println!("Warning: {}", warning);
    }

    Ok(())
}

fn create_dry_run(paths: &VaultPaths, options: &CreateOptions) -> VaultResult<()> {
    let plan = BackupManager::new(paths.clone()).plan(options)?;

    println!("Dry run: no archive will be written");
    println!();
    println!("Roots:");
    for root in &plan.roots {
        println!("  {}", root.display());
    }
    println!("Excluding:");
    for pattern in &plan.patterns {
        println!("  {}", pattern);
    }
    println!("Target: {}", plan.target);
    println!();

    for entry in &plan.entries {
        match entry.kind {
            EntryKind::Directory => println!("  {}/", entry.path.display()),
            _ => println!("  {} ({})", entry.path.display(), format_size(entry.size)),
        }
    }

    println!();
    println!(
        "Would archive {} entries ({})",
        plan.entries.len(),
        format_size(plan.total_bytes())
    );
    for warning in &plan.warnings {
        println!("Warning: {}", warning);
    }

    Ok(())
}

fn restore(
    paths: &VaultPaths,
    from: BackendKind,
    selector: Option<Selector>,
    dest: PathBuf,
    dry_run: bool,
    yes: bool,
) -> VaultResult<()> {
    let manager = RestoreManager::new(paths.clone());

    let Some(selector) = selector else {
        let candidates = manager.candidates(from)?;
        if candidates.is_empty() {
            println!("No backups found on {}.", from);
        } else {
            println!("Available backups on {}:", from);
            for archive in &candidates {
                println!("  {}", archive.name);
            }
        }
        return Err(VaultError::Validation(
            "Choose a backup by name, --date or --latest".to_string(),
        ));
    };

    let options = RestoreOptions::new(from, selector).destination_root(dest);

    if dry_run {
        let plan = manager.plan(&options)?;
        println!("Dry run: nothing will be written");
        println!(
            "Backup: {} ({})",
            plan.archive.name,
            format_size(plan.archive.size_bytes)
        );
        println!();
        for member in &plan.members {
            print_member(&options.destination_root, member);
        }
        println!();
        println!("Would restore {} entries", plan.members.len());
        return Ok(());
    }

    let archive = manager.resolve(from, &options.selector)?;

    println!("Backup Information");
    println!("==================");
    println!("Backup: {}", archive.name);
    println!("Source: {}", from);
    println!("Size: {}", format_size(archive.size_bytes));
    if let Some(created) = archive.created_at {
        println!("Created: {}", created.format("%Y-%m-%d %H:%M:%S"));
    }
    println!();
    println!(
        "WARNING: This will overwrite files under {}",
        options.destination_root.display()
    );

    if !yes && !confirm("Continue? [y/N] ")? {
        println!("Restore cancelled.");
        return Ok(());
    }

    println!("Restoring from backup...");
    let report = manager.restore_archive(from, &archive, &options.destination_root)?;

    println!("Restore complete!");
    println!("{}", report.summary());
    if report.extract.skipped > 0 {
        println!("Skipped {} unsupported entries", report.extract.skipped);
    }

    Ok(())
}

fn print_member(root: &Path, member: &ArchiveMember) {
    let target = root.join(member.path.strip_prefix("/").unwrap_or(&member.path));
    match member.kind {
        EntryKind::Directory => println!("  {}/ ({:o})", target.display(), member.mode),
        EntryKind::File => println!(
            "  {} ({:o}, {})",
            target.display(),
            member.mode,
            format_size(member.size)
        ),
        EntryKind::Other => println!("  {} (skipped)", target.display()),
    }
}

/// Ask a yes/no question on stdin; only `y` proceeds
fn confirm(prompt: &str) -> VaultResult<bool> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}

fn list(paths: &VaultPaths, from: BackendKind, json: bool, verbose: bool) -> VaultResult<()> {
    let (policy, _) = load_policy_or_default(paths);
    let registry = registry_for(paths, &policy);
    let backups = Catalog::new(registry.get(from)?).list()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&backups)?);
        return Ok(());
    }

    if backups.is_empty() {
        println!("No backups found on {}.", from);
        println!("Create one with: nodevault create");
        return Ok(());
    }

    println!("Available Backups ({})", from);
    println!("=================");
    println!();

    for (i, backup) in backups.iter().enumerate() {
        let age_str = age(backup);

        if verbose {
            println!(
                "{}. {}\n   Created: {}\n   Size: {}\n   Age: {}\n   Location: {}\n",
                i + 1,
                backup.name,
                backup
                    .created_at
                    .map(|c| c.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
                format_size(backup.size_bytes),
                age_str,
                backup.location.display(),
            );
        } else {
            println!(
                "  {}. {} ({} ago, {})",
                i + 1,
                backup.name,
                age_str,
                format_size(backup.size_bytes),
            );
        }
    }

    println!();
    println!("Total: {} backup(s)", backups.len());
    Ok(())
}

fn status(paths: &VaultPaths) -> VaultResult<()> {
    let status = BackupManager::new(paths.clone()).status()?;

    println!("nodevault Status");
    println!("================");
    println!("State directory:  {}", status.state_dir.display());
    println!("Backup directory: {}", status.backup_dir.display());
    println!("Policy file:      {}", status.policy_file.display());
    println!();

    match (&status.policy, &status.policy_error) {
        (_, Some(error)) => println!("Policy: unreadable ({})", error),
        (None, None) => {
            println!("Policy: not configured");
            println!("Enable automatic backups with: nodevault schedule");
        }
        (Some(policy), None) => {
            println!(
                "Automatic backups: {}",
                if policy.enabled { "enabled" } else { "disabled" }
            );
            if !policy.schedule.is_empty() {
                println!("Schedule:  {}", policy.schedule);
            }
            match policy.retention_limit() {
                Some(limit) => println!("Retention: {} backup(s)", limit),
                None => println!("Retention: keep all"),
            }
            println!("Target:    {}", policy.target);
        }
    }
    println!();

    println!("Local backups: {}", status.local_archives.len());
    if let Some(latest) = status.local_archives.last() {
        println!(
            "Latest: {} ({} ago, {})",
            latest.name,
            age(latest),
            format_size(latest.size_bytes)
        );
    }
    match &status.removable_mount {
        Some(mount) => println!("Removable media: {}", mount.display()),
        None => println!("Removable media: not mounted"),
    }

    Ok(())
}

fn schedule(
    paths: &VaultPaths,
    cron: &str,
    retention: i64,
    target: BackendKind,
    disable: bool,
) -> VaultResult<()> {
    let program = std::env::current_exe()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| FALLBACK_PROGRAM.to_string());
    let scheduler = Scheduler::new(paths.clone(), program);

    let report = if disable {
        let report = scheduler.disable()?;
        println!("Automatic backups disabled");
        report
    } else {
        let report = scheduler.enable(cron, retention, target)?;
        println!("Automatic backups enabled");
        println!("Schedule:  {}", report.policy.schedule);
        match report.policy.retention_limit() {
            Some(limit) => println!("Retention: {} backup(s)", limit),
            None => println!("Retention: keep all"),
        }
        println!("Target:    {}", report.policy.target);
        report
    };

    println!("Policy saved: {}", report.policy_file.display());
    if report.cron_updated {
        println!("Cron job: {}", report.cron_file.display());
    }
    for warning in &report.warnings {
        println!("Warning: {}", warning);
    }

    Ok(())
}

fn prune(paths: &VaultPaths, from: BackendKind, force: bool) -> VaultResult<()> {
    let manager = BackupManager::new(paths.clone());
    let (limit, doomed) = manager.plan_prune(from)?;

    let Some(limit) = limit else {
        println!("Retention is disabled; nothing to prune.");
        println!("Set a limit with: nodevault schedule --retention <n>");
        return Ok(());
    };

    if doomed.is_empty() {
        println!("No backups to prune.");
        println!("Current retention policy: keep {}", limit);
        return Ok(());
    }

    println!("Prune Summary");
    println!("=============");
    println!("Retention policy: keep {}", limit);
    println!("To be deleted from {}:", from);
    for archive in &doomed {
        println!("  {} ({})", archive.name, format_size(archive.size_bytes));
    }
    println!();

    if !force {
        println!("To delete old backups, run again with --force flag:");
        println!("  nodevault prune --from {} --force", from);
        return Ok(());
    }

    let report = manager.prune(from)?;
    println!("Deleted {} backup(s).", report.deleted.len());
    for (name, reason) in &report.failed {
        println!("Warning: could not delete {}: {}", name, reason);
    }

    Ok(())
}

/// Human-readable age of an archive, from the time in its name
fn age(archive: &ArchiveInfo) -> String {
    match archive.created_at {
        Some(created) => format_duration(Local::now().naive_local() - created),
        None => "?".to_string(),
    }
}

/// Format a duration in human-readable form
fn format_duration(duration: chrono::Duration) -> String {
    let total_seconds = duration.num_seconds().max(0);

    if total_seconds < 60 {
        return format!("{}s", total_seconds);
    }

    let minutes = total_seconds / 60;
    if minutes < 60 {
        return format!("{}m", minutes);
    }

    let hours = minutes / 60;
    if hours < 24 {
        return format!("{}h", hours);
    }

    let days = hours / 24;
    if days < 30 {
        return format!("{}d", days);
    }

    let months = days / 30;
    format!("{}mo", months)
}

/// Format a file size in human-readable form
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
