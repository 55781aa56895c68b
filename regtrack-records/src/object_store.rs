//! Object storage boundary
//!
//! Document blobs live outside the record database. The cascade delete
//! engine treats blob deletion as best-effort: failures are logged and
//! never block metadata deletion.

use async_trait::async_trait;
use regtrack_common::Result;
use std::path::PathBuf;

/// External blob storage for document files
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Delete the blob stored under the given key
    async fn delete_object(&self, key: &str) -> Result<()>;
}

/// Filesystem-backed object store rooted at one directory
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn delete_object(&self, key: &str) -> Result<()> {
        let path = self.root.join(key);
        tokio::fs::remove_file(&path).await?;
        tracing::debug!(key = %key, "Deleted object blob");
        Ok(())
    }
}
