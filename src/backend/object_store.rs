//! Object storage backend
//!
//! Holds the endpoint settings from the policy document. No transport is
//! wired up yet, so every operation reports `NotImplemented`.

use std::io::Read;
use std::path::{Path, PathBuf};

use super::{ArchiveInfo, Backend, BackendKind};
use crate::config::policy::ObjectStoreSettings;
use crate::error::{VaultError, VaultResult};

#[derive(Debug, Clone, Default)]
pub struct ObjectStoreBackend {
    settings: ObjectStoreSettings,
}

impl ObjectStoreBackend {
    pub fn new(settings: ObjectStoreSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ObjectStoreSettings {
        &self.settings
    }

    fn unsupported(&self, operation: &str) -> VaultError {
        let endpoint = if self.settings.endpoint.is_empty() {
            "unconfigured endpoint"
        } else {
            self.settings.endpoint.as_str()
        };
        VaultError::NotImplemented(format!(
            "S3 {} ({}) is not yet implemented",
            operation, endpoint
        ))
    }
}

impl Backend for ObjectStoreBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::S3
    }

    fn store(&self, _archive: &Path, _name: &str) -> VaultResult<PathBuf> {
        Err(self.unsupported("upload"))
    }

    fn list(&self) -> VaultResult<Vec<ArchiveInfo>> {
        Err(self.unsupported("listing"))
    }

    fn fetch(&self, _name: &str) -> VaultResult<Box<dyn Read>> {
        Err(self.unsupported("download"))
    }

    fn delete(&self, _name: &str) -> VaultResult<()> {
        Err(self.unsupported("delete"))
    }
}
