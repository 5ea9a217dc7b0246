//! Configuration module for nodevault
//!
//! This module provides configuration management including:
//! - Path resolution with environment overrides
//! - Backup policy persistence
//! - Scheduler projection

pub mod file_io;
pub mod paths;
pub mod policy;

pub use paths::VaultPaths;
pub use policy::{BackupPolicy, ObjectStoreSettings, PolicyStore};
