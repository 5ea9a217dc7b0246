//! nodevault - state snapshots for edge nodes
//!
//! This library creates, stores, lists, prunes and restores point-in-time
//! archives of a node's configuration and credential state (and optionally
//! its user data) across local disk, removable media and object storage.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `archive`: path selection, exclusions, archive building and extraction
//! - `backend`: storage targets behind a common trait, plus the registry
//! - `backup`: create/restore/retention/catalog/schedule operations
//! - `config`: path resolution and the backup policy document
//! - `cli`: clap command definitions and handlers
//! - `error`: custom error types
//! - `logging`: tracing subscriber setup
//!
//! # Example
//!
//! ```rust,ignore
//! use nodevault::backup::{BackupManager, CreateOptions};
//! use nodevault::config::VaultPaths;
//!
//! let paths = VaultPaths::new();
//! let report = BackupManager::new(paths).create(&CreateOptions::default())?;
//! println!("{}", report.path.display());
//! ```

pub mod archive;
pub mod backend;
pub mod backup;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;

pub use error::{VaultError, VaultResult};
