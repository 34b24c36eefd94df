//! Download and upload adapters between the object store and the staging area.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::StoreError;
use crate::staging::StagingArea;
use crate::store::ObjectStore;

/// Downloads one object into the staging area under its base name.
pub struct Fetcher {
    store: Arc<dyn ObjectStore>,
    staging: StagingArea,
}

impl Fetcher {
    pub fn new(store: Arc<dyn ObjectStore>, staging: StagingArea) -> Self {
        Self { store, staging }
    }

    /// Fetches the full object body and writes it to the staging area,
    /// overwriting any existing file of the same name. Errors propagate.
    pub async fn fetch(&self, bucket: &str, key: &str) -> Result<PathBuf, StoreError> {
        let body = self.store.get(bucket, key).await?;
        let path = self.staging.original_path(key);
        std::fs::write(&path, &body)?;
        Ok(path)
    }
}

/// Uploads one local file back under the target prefix.
pub struct Publisher {
    store: Arc<dyn ObjectStore>,
}

impl Publisher {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Uploads the local file's current bytes under a key derived from its
    /// base name, overwriting the remote original. Errors propagate.
    pub async fn publish(
        &self,
        bucket: &str,
        prefix: &str,
        local: &Path,
    ) -> Result<String, StoreError> {
        let name = local
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| StoreError::InvalidKey(local.display().to_string()))?;
        let key = format!("{prefix}{name}");

        let body = std::fs::read(local)?;
        self.store.put(bucket, &key, body).await?;
        Ok(key)
    }
}
