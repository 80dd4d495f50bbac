//! Key-addressed blob storage
//!
//! Holds oversized payloads that do not fit in the primary document. Content
//! is opaque bytes; keys are opaque strings.

mod gridfs;
mod memory;

use async_trait::async_trait;

use crate::types::Result;

pub use gridfs::{bucket_name, GridFsBlobStore};
pub use memory::MemoryBlobStore;

/// Uniform put/get/delete over a large-object store
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `key`, replacing any earlier content for that key
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()>;

    /// Fetch the content stored under `key`, or `None` if there is none
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Remove the content stored under `key`. Missing keys are not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}
