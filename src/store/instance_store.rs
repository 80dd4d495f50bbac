//! Hybrid instance store
//!
//! Persists workflow instances in a document collection and moves oversized
//! `Variables` payloads to a blob store.
//!
//! The two stores are written independently, with no transaction spanning
//! them and no rollback:
//!
//! - an interrupted save can leave a document referencing a blob that was
//!   never written; reads then see the fallback variables
//! - an interrupted delete can leave an orphaned blob nothing references
//! - concurrent saves of one id race, and the last write to finish wins for
//!   the document and the blob separately
//!
//! Dropping an operation's future cancels it at its current I/O call with the
//! same partial-effect consequences.

use bson::Document;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::codec::{blob_key, document_blob_reference, EncodedInstance, InstanceCodec};
use super::id::{IdGenerator, UuidGenerator};
use super::query::InstanceQuery;
use super::rehydrate::Rehydrator;
use crate::blob::{BlobStore, MemoryBlobStore};
use crate::config::StoreConfig;
use crate::db::schemas::{WorkflowInstance, ID_FIELD};
use crate::db::{InstanceCollection, MemoryInstanceCollection, MongoClient};
use crate::types::Result;

/// Workflow instance store over a document collection plus blob store
pub struct InstanceStore {
    collection: Arc<dyn InstanceCollection>,
    blobs: Arc<dyn BlobStore>,
    codec: InstanceCodec,
    rehydrator: Rehydrator,
    ids: Arc<dyn IdGenerator>,
}

impl InstanceStore {
    /// Compose a store from its collaborators
    pub fn new(
        collection: Arc<dyn InstanceCollection>,
        blobs: Arc<dyn BlobStore>,
        config: &StoreConfig,
    ) -> Self {
        Self {
            collection,
            rehydrator: Rehydrator::new(blobs.clone()),
            blobs,
            codec: InstanceCodec::new(config.offload_threshold),
            ids: Arc::new(UuidGenerator),
        }
    }

    /// Open the MongoDB collection and its GridFS bucket
    pub async fn connect(mongo: &MongoClient, config: &StoreConfig) -> Result<Self> {
        let collection = mongo.instance_collection(&config.collection_name).await?;
        let blobs = mongo.blob_store(&config.collection_name);

        info!(
            "InstanceStore ready on collection '{}' (offload above {} bytes)",
            config.collection_name, config.offload_threshold
        );

        Ok(Self::new(Arc::new(collection), Arc::new(blobs), config))
    }

    /// Create a store without MongoDB
    pub fn memory_only(config: &StoreConfig) -> Self {
        warn!("InstanceStore running in memory-only mode (no MongoDB)");

        Self::new(
            Arc::new(MemoryInstanceCollection::new()),
            Arc::new(MemoryBlobStore::new()),
            config,
        )
    }

    /// Replace the identifier generator used for new instances
    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Encode, writing any offloaded payload to the blob store first
    async fn encode_and_offload(&self, instance: &WorkflowInstance) -> Result<Document> {
        let EncodedInstance {
            id,
            document,
            offload,
        } = self.codec.encode(instance)?;

        if let Some(offload) = offload {
            debug!(id = %id, key = %offload.key, size = offload.content.len(), "Offloading variables");
            self.blobs.put(&offload.key, offload.content.into_bytes()).await?;
        }

        Ok(document)
    }

    /// Insert or replace an instance, assigning an id if it has none.
    ///
    /// Saving small variables over a previously offloaded record leaves the
    /// old blob in place. A point delete will not find it either, since the
    /// document no longer references it; only [`delete_many`](Self::delete_many)
    /// reclaims it.
    pub async fn save(&self, mut instance: WorkflowInstance) -> Result<WorkflowInstance> {
        if instance.id.is_empty() {
            instance.id = self.ids.generate();
        }

        let document = self.encode_and_offload(&instance).await?;
        self.collection.replace(&instance.id, document, true).await?;

        debug!(id = %instance.id, "Saved workflow instance");
        Ok(instance)
    }

    /// Replace an existing instance.
    ///
    /// Unlike [`save`](Self::save) this never creates a record: if no
    /// instance with this id exists the call does nothing and still returns
    /// `Ok(())`, so callers cannot tell an update from a miss. An oversized
    /// payload is written to the blob store before the replace, so a missed
    /// update can leave an unreferenced blob behind.
    pub async fn update(&self, instance: &WorkflowInstance) -> Result<()> {
        if instance.id.is_empty() {
            debug!("Update of instance without id ignored");
            return Ok(());
        }

        let document = self.encode_and_offload(instance).await?;
        let written = self.collection.replace(&instance.id, document, false).await?;

        if !written {
            debug!(id = %instance.id, "Update matched no workflow instance");
        }
        Ok(())
    }

    /// Insert several new instances in one batch, assigning missing ids.
    /// Each instance is offloaded on its own size. An empty batch does no I/O.
    ///
    /// The batch insert runs before any blob is written, so a rejected batch
    /// (a duplicate id, say) never touches the blobs of existing records. An
    /// interruption after the insert leaves references to blobs not yet
    /// written, which read back as the fallback variables.
    pub async fn add_many(&self, instances: Vec<WorkflowInstance>) -> Result<Vec<WorkflowInstance>> {
        if instances.is_empty() {
            return Ok(instances);
        }

        let mut instances = instances;
        for instance in instances.iter_mut().filter(|i| i.id.is_empty()) {
            instance.id = self.ids.generate();
        }

        // Encode everything up front so a bad record fails before any write
        let encoded = instances
            .iter()
            .map(|instance| self.codec.encode(instance))
            .collect::<Result<Vec<_>>>()?;

        let mut documents = Vec::with_capacity(encoded.len());
        let mut offloads = Vec::new();
        for EncodedInstance { document, offload, .. } in encoded {
            documents.push(document);
            offloads.extend(offload);
        }

        self.collection.insert_many(documents).await?;

        for offload in offloads {
            debug!(key = %offload.key, size = offload.content.len(), "Offloading variables");
            self.blobs.put(&offload.key, offload.content.into_bytes()).await?;
        }

        debug!(count = instances.len(), "Inserted workflow instances");
        Ok(instances)
    }

    /// Delete an instance and its offloaded payload, if any
    pub async fn delete(&self, instance: &WorkflowInstance) -> Result<bool> {
        self.delete_by_id(&instance.id).await
    }

    /// Delete the instance with this id and its offloaded payload, if any.
    /// Returns whether a record was removed; a missing id is not an error.
    pub async fn delete_by_id(&self, id: &str) -> Result<bool> {
        let Some(removed) = self.collection.find_one_and_delete(id).await? else {
            debug!(id = %id, "Delete matched no workflow instance");
            return Ok(false);
        };

        if let Some(key) = document_blob_reference(&removed) {
            self.blobs.delete(&key).await?;
        }

        debug!(id = %id, "Deleted workflow instance");
        Ok(true)
    }

    /// Delete every instance matching `query` and return how many documents
    /// were removed. Ordering and paging in the query are honoured, so large
    /// purges can run in batches.
    ///
    /// The blob key of every matched id is deleted whether or not that record
    /// was offloaded, relying on blob deletion being idempotent. Every key is
    /// attempted even after a failure; the first blob error is then returned,
    /// with the documents already gone and the failed keys left orphaned.
    pub async fn delete_many(&self, query: &InstanceQuery) -> Result<u64> {
        let ids = self.collection.find_ids(query).await?;
        if ids.is_empty() {
            return Ok(0);
        }

        let deleted = self.collection.delete_by_ids(&ids).await?;

        let mut first_error = None;
        for id in &ids {
            let key = blob_key(id);
            if let Err(e) = self.blobs.delete(&key).await {
                warn!(key = %key, "Failed to delete blob of removed instance: {}", e);
                first_error.get_or_insert(e);
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        info!(matched = ids.len(), deleted, "Deleted workflow instances");
        Ok(deleted)
    }

    /// Instances matching `query`, in query order
    pub async fn find_many(&self, query: &InstanceQuery) -> Result<Vec<WorkflowInstance>> {
        let ids = self.collection.find_ids(query).await?;
        self.load_ordered(&ids).await
    }

    /// First instance matching `query`, or `None` if nothing matches
    pub async fn find_one(&self, query: &InstanceQuery) -> Result<Option<WorkflowInstance>> {
        let ids = self.collection.find_ids(&query.first()).await?;
        Ok(self.load_ordered(&ids).await?.into_iter().next())
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<WorkflowInstance>> {
        self.find_one(&InstanceQuery::by_id(id)).await
    }

    /// Number of instances matching `query`, ignoring paging
    pub async fn count(&self, query: &InstanceQuery) -> Result<u64> {
        self.collection.count(query).await
    }

    /// Fetch raw documents for `ids`, rehydrate and decode them, and return
    /// them in the order of `ids`. Ids whose document vanished since the
    /// query are skipped.
    async fn load_ordered(&self, ids: &[String]) -> Result<Vec<WorkflowInstance>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut by_id: HashMap<String, Document> = self
            .collection
            .find_raw(ids)
            .await?
            .into_iter()
            .filter_map(|document| {
                let id = document.get_str(ID_FIELD).ok()?.to_owned();
                Some((id, document))
            })
            .collect();

        let mut instances = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(mut document) = by_id.remove(id) else {
                continue;
            };
            self.rehydrator.rehydrate(&mut document).await?;
            instances.push(self.codec.decode(document)?);
        }

        Ok(instances)
    }
}
