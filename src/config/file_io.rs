//! File I/O utilities with atomic writes
//!
//! Provides safe file operations that won't corrupt the policy document or
//! the scheduler projection on failure.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use crate::error::VaultError;

/// Read YAML from a file, returning `None` if the file doesn't exist
pub fn read_yaml<T, P>(path: P) -> Result<Option<T>, VaultError>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();

    if !path.exists() {
        return Ok(None);
    }

    let file = File::open(path)
        .map_err(|e| VaultError::Io(format!("Failed to open {}: {}", path.display(), e)))?;

    let reader = BufReader::new(file);
    serde_yaml::from_reader(reader)
        .map(Some)
        .map_err(|e| VaultError::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Write YAML to a file atomically (write to temp, then rename)
pub fn write_yaml_atomic<T, P>(path: P, data: &T) -> Result<(), VaultError>
where
    T: Serialize,
    P: AsRef<Path>,
{
    let yaml = serde_yaml::to_string(data)
        .map_err(|e| VaultError::Config(format!("Failed to serialize data: {}", e)))?;
    write_atomic(path, yaml.as_bytes())
}

/// Write raw bytes to a file atomically
///
/// The file is either completely written or not modified at all.
pub fn write_atomic<P: AsRef<Path>>(path: P, contents: &[u8]) -> Result<(), VaultError> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            VaultError::Io(format!(
                "Failed to create directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }

    // Same directory as the target, so the rename stays on one filesystem
    let temp_path = temp_sibling(path);

    let file = File::create(&temp_path)
        .map_err(|e| VaultError::Io(format!("Failed to create temp file: {}", e)))?;

    let mut writer = BufWriter::new(file);
    writer
        .write_all(contents)
        .and_then(|_| writer.flush())
        .and_then(|_| writer.get_ref().sync_all())
        .map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            VaultError::Io(format!("Failed to write {}: {}", path.display(), e))
        })?;

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        VaultError::Io(format!("Failed to rename temp file: {}", e))
    })?;

    Ok(())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tmp", name))
}
