//! Restores offloaded `Variables` content into raw documents before decoding

use bson::Document;
use std::sync::Arc;
use tracing::warn;

use super::codec::document_blob_reference;
use crate::blob::BlobStore;
use crate::db::schemas::VARIABLES_FIELD;
use crate::types::{Result, StoreError};

/// Substituted when a referenced blob no longer exists
pub const MISSING_BLOB_FALLBACK: &str = r#"{"Data":{}}"#;

/// Resolves blob references in raw instance documents
#[derive(Clone)]
pub struct Rehydrator {
    blobs: Arc<dyn BlobStore>,
}

impl Rehydrator {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }

    /// Replace a blob reference in `Variables` with the blob's text. Only the
    /// key derived from the document's own `_id` counts as a reference.
    ///
    /// A missing blob yields [`MISSING_BLOB_FALLBACK`] instead of an error, so
    /// previously stored variables are silently lost if their blob was
    /// removed out of band. Documents without a reference are left untouched.
    pub async fn rehydrate(&self, document: &mut Document) -> Result<()> {
        let Some(key) = document_blob_reference(document) else {
            return Ok(());
        };

        let content = match self.blobs.get(&key).await? {
            Some(bytes) => String::from_utf8(bytes).map_err(|e| {
                StoreError::Serialization(format!("Blob {} is not valid UTF-8: {}", key, e))
            })?,
            None => {
                warn!(key = %key, "Referenced blob missing, substituting empty variables");
                MISSING_BLOB_FALLBACK.to_string()
            }
        };

        document.insert(VARIABLES_FIELD, content);
        Ok(())
    }
}
