//! MongoDB client and instance collection
//!
//! Pattern adapted from holo-host/rust/util_libs/db/src/mongodb

use async_trait::async_trait;
use bson::{doc, Document};
use futures_util::TryStreamExt;
use mongodb::{
    options::{FindOptions, IndexOptions, ReplaceOptions},
    Client, Collection, Database, IndexModel,
};
use serde::Deserialize;
use tracing::{debug, info};

use crate::blob::GridFsBlobStore;
use crate::db::collection::InstanceCollection;
use crate::db::schemas::{WorkflowInstance, ID_FIELD};
use crate::store::InstanceQuery;
use crate::types::{Result, StoreError};

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Create a new MongoDB client
    pub async fn new(uri: &str, db_name: &str) -> Result<Self> {
        info!("Connecting to MongoDB at {}", uri);

        // Use serverSelectionTimeoutMS to avoid hanging on unreachable MongoDB
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to connect to MongoDB: {}", e)))?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| StoreError::Database(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    pub fn database(&self) -> Database {
        self.client.database(&self.db_name)
    }

    /// Open the instance collection, applying its indexes
    pub async fn instance_collection(&self, name: &str) -> Result<MongoInstanceCollection> {
        MongoInstanceCollection::new(&self.database(), name).await
    }

    /// Open the GridFS bucket paired with an instance collection
    pub fn blob_store(&self, collection_name: &str) -> GridFsBlobStore {
        GridFsBlobStore::new(&self.database(), collection_name)
    }

    /// Get the raw MongoDB client
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Get the database name
    pub fn db_name(&self) -> &str {
        &self.db_name
    }
}

/// Projection target for id-only queries
#[derive(Debug, Deserialize)]
struct IdOnly {
    #[serde(rename = "_id")]
    id: String,
}

/// Instance collection with a typed view for queries and a raw view for
/// document-level reads and writes
#[derive(Debug, Clone)]
pub struct MongoInstanceCollection {
    typed: Collection<WorkflowInstance>,
    raw: Collection<Document>,
}

impl MongoInstanceCollection {
    /// Open the collection and apply schema indexes
    pub async fn new(db: &Database, collection_name: &str) -> Result<Self> {
        let collection = Self {
            typed: db.collection::<WorkflowInstance>(collection_name),
            raw: db.collection::<Document>(collection_name),
        };

        collection.apply_indexes().await?;

        Ok(collection)
    }

    /// Apply schema-defined indexes
    async fn apply_indexes(&self) -> Result<()> {
        let schema_indices = WorkflowInstance::into_indices();

        if schema_indices.is_empty() {
            return Ok(());
        }

        let indices: Vec<IndexModel> = schema_indices
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        self.typed
            .create_indexes(indices)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to create indexes: {}", e)))?;

        Ok(())
    }

    fn id_filter(ids: &[String]) -> Document {
        doc! { ID_FIELD: { "$in": ids.to_vec() } }
    }
}

#[async_trait]
impl InstanceCollection for MongoInstanceCollection {
    async fn find_ids(&self, query: &InstanceQuery) -> Result<Vec<String>> {
        let options = FindOptions::builder()
            .projection(doc! { ID_FIELD: 1 })
            .sort(query.to_sort())
            .skip(query.skip)
            .limit(query.limit)
            .build();

        let ids: Vec<IdOnly> = self
            .typed
            .clone_with_type::<IdOnly>()
            .find(query.to_filter())
            .with_options(options)
            .await
            .map_err(|e| StoreError::Database(format!("Query failed: {}", e)))?
            .try_collect()
            .await
            .map_err(|e| StoreError::Database(format!("Query cursor failed: {}", e)))?;

        Ok(ids.into_iter().map(|row| row.id).collect())
    }

    async fn count(&self, query: &InstanceQuery) -> Result<u64> {
        self.typed
            .count_documents(query.to_filter())
            .await
            .map_err(|e| StoreError::Database(format!("Count failed: {}", e)))
    }

    async fn replace(&self, id: &str, document: Document, upsert: bool) -> Result<bool> {
        let options = ReplaceOptions::builder().upsert(upsert).build();

        let result = self
            .raw
            .replace_one(doc! { ID_FIELD: id }, document)
            .with_options(options)
            .await
            .map_err(|e| StoreError::Database(format!("Replace failed: {}", e)))?;

        debug!(id = %id, upsert, matched = result.matched_count, "Replaced instance document");
        Ok(result.matched_count > 0 || result.upserted_id.is_some())
    }

    async fn insert_many(&self, documents: Vec<Document>) -> Result<()> {
        self.raw
            .insert_many(documents)
            .await
            .map_err(|e| StoreError::Database(format!("Insert failed: {}", e)))?;
        Ok(())
    }

    async fn find_raw(&self, ids: &[String]) -> Result<Vec<Document>> {
        self.raw
            .find(Self::id_filter(ids))
            .await
            .map_err(|e| StoreError::Database(format!("Find failed: {}", e)))?
            .try_collect()
            .await
            .map_err(|e| StoreError::Database(format!("Find cursor failed: {}", e)))
    }

    async fn find_one_and_delete(&self, id: &str) -> Result<Option<Document>> {
        self.raw
            .find_one_and_delete(doc! { ID_FIELD: id })
            .await
            .map_err(|e| StoreError::Database(format!("Delete failed: {}", e)))
    }

    async fn delete_by_ids(&self, ids: &[String]) -> Result<u64> {
        let result = self
            .raw
            .delete_many(Self::id_filter(ids))
            .await
            .map_err(|e| StoreError::Database(format!("Bulk delete failed: {}", e)))?;
        Ok(result.deleted_count)
    }
}
