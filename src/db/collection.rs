//! Collection capability used by the instance store
//!
//! One logical collection seen two ways: a typed view used for predicate
//! evaluation, ordering and paging, and a raw document view used for writes
//! and for reads that need field-level access before decoding.

use async_trait::async_trait;
use bson::Document;

use crate::store::InstanceQuery;
use crate::types::Result;

#[async_trait]
pub trait InstanceCollection: Send + Sync {
    /// Ids of instances matching `query`, ordered and paged as requested
    async fn find_ids(&self, query: &InstanceQuery) -> Result<Vec<String>>;

    /// Number of instances matching `query`, ignoring paging
    async fn count(&self, query: &InstanceQuery) -> Result<u64>;

    /// Replace the raw document with the given id. With `upsert` a missing
    /// document is created; without it nothing happens. Returns whether a
    /// document was written.
    async fn replace(&self, id: &str, document: Document, upsert: bool) -> Result<bool>;

    /// Insert raw documents in one batch
    async fn insert_many(&self, documents: Vec<Document>) -> Result<()>;

    /// Raw documents with the given ids, in no particular order
    async fn find_raw(&self, ids: &[String]) -> Result<Vec<Document>>;

    /// Atomically remove and return the raw document with the given id
    async fn find_one_and_delete(&self, id: &str) -> Result<Option<Document>>;

    /// Remove raw documents with the given ids, returning how many were removed
    async fn delete_by_ids(&self, ids: &[String]) -> Result<u64>;
}
