//! GridFS-backed blob store
//!
//! Each key maps to one GridFS file of the same name in the bucket
//! `"{collection}_GridFs"`. Writes upload a new revision and then drop older
//! revisions, so a key never fans out into several live files.

use async_trait::async_trait;
use bson::{doc, Bson};
use futures_util::io::{AsyncReadExt, AsyncWriteExt};
use futures_util::TryStreamExt;
use mongodb::{
    error::{ErrorKind, GridFsErrorKind},
    gridfs::GridFsBucket,
    options::{GridFsBucketOptions, GridFsFindOptions},
    Database,
};
use tracing::{debug, info};

use super::BlobStore;
use crate::types::{Result, StoreError};

/// Bucket name paired with an instance collection
pub fn bucket_name(collection_name: &str) -> String {
    format!("{}_GridFs", collection_name)
}

/// Blob store over a MongoDB GridFS bucket
#[derive(Debug, Clone)]
pub struct GridFsBlobStore {
    bucket: GridFsBucket,
    bucket_name: String,
}

impl GridFsBlobStore {
    /// Open the bucket paired with `collection_name`
    pub fn new(db: &Database, collection_name: &str) -> Self {
        let bucket_name = bucket_name(collection_name);
        let options = GridFsBucketOptions::builder()
            .bucket_name(bucket_name.clone())
            .build();

        info!("GridFS bucket '{}' ready", bucket_name);

        Self {
            bucket: db.gridfs_bucket(options),
            bucket_name,
        }
    }

    pub fn bucket_name(&self) -> &str {
        &self.bucket_name
    }

    /// Ids of all stored revisions of `key`, newest first
    async fn revision_ids(&self, key: &str) -> Result<Vec<Bson>> {
        let options = GridFsFindOptions::builder()
            .sort(doc! { "uploadDate": -1 })
            .build();

        let files: Vec<_> = self
            .bucket
            .find(doc! { "filename": key })
            .with_options(options)
            .await
            .map_err(|e| StoreError::Blob(format!("GridFS find failed: {}", e)))?
            .try_collect()
            .await
            .map_err(|e| StoreError::Blob(format!("GridFS cursor failed: {}", e)))?;

        Ok(files.into_iter().map(|file| file.id).collect())
    }

    /// Delete one revision, tolerating a concurrent delete of the same file
    async fn delete_revision(&self, id: Bson) -> Result<()> {
        match self.bucket.delete(id).await {
            Ok(()) => Ok(()),
            Err(e) if matches!(*e.kind, ErrorKind::GridFs(GridFsErrorKind::FileNotFound { .. })) => {
                Ok(())
            }
            Err(e) => Err(StoreError::Blob(format!("GridFS delete failed: {}", e))),
        }
    }
}

#[async_trait]
impl BlobStore for GridFsBlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        let previous = self.revision_ids(key).await?;

        let mut upload = self
            .bucket
            .open_upload_stream(key)
            .await
            .map_err(|e| StoreError::Blob(format!("GridFS upload failed: {}", e)))?;

        upload
            .write_all(&bytes)
            .await
            .map_err(|e| StoreError::Blob(format!("GridFS write failed: {}", e)))?;
        upload
            .close()
            .await
            .map_err(|e| StoreError::Blob(format!("GridFS close failed: {}", e)))?;

        for id in previous {
            self.delete_revision(id).await?;
        }

        debug!(key = %key, size = bytes.len(), bucket = %self.bucket_name, "Uploaded blob");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let Some(latest) = self.revision_ids(key).await?.into_iter().next() else {
            return Ok(None);
        };

        let mut download = match self.bucket.open_download_stream(latest).await {
            Ok(stream) => stream,
            // Removed between the lookup and the open
            Err(e) if matches!(*e.kind, ErrorKind::GridFs(GridFsErrorKind::FileNotFound { .. })) => {
                return Ok(None);
            }
            Err(e) => return Err(StoreError::Blob(format!("GridFS download failed: {}", e))),
        };

        let mut bytes = Vec::new();
        download
            .read_to_end(&mut bytes)
            .await
            .map_err(|e| StoreError::Blob(format!("GridFS read failed: {}", e)))?;

        Ok(Some(bytes))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let revisions = self.revision_ids(key).await?;
        let count = revisions.len();

        for id in revisions {
            self.delete_revision(id).await?;
        }

        if count > 0 {
            debug!(key = %key, revisions = count, "Deleted blob");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_name() {
        assert_eq!(bucket_name("WorkflowInstances"), "WorkflowInstances_GridFs");
    }
}
