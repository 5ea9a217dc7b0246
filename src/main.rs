use anyhow::Result;
use clap::Parser;

use nodevault::cli::{handle_backup_command, BackupCommands};
use nodevault::config::VaultPaths;

#[derive(Parser)]
#[command(
    name = "nodevault",
    version,
    about = "Snapshot and restore edge-node state",
    long_about = "nodevault creates, lists, prunes and restores compressed archives \
                  of a node's state directory, on local disk, removable media or \
                  object storage. Running it without a command shows the status."
)]
struct Cli {
    /// Log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "warn", env = "NODEVAULT_LOG")]
    log_level: String,

    #[command(subcommand)]
    command: Option<BackupCommands>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    nodevault::logging::init(&cli.log_level)?;

    let paths = VaultPaths::new();
    handle_backup_command(&paths, cli.command.unwrap_or(BackupCommands::Status))?;

    Ok(())
}
