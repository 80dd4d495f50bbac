//! In-memory instance collection
//!
//! Holds raw documents keyed by id and evaluates queries against the fields
//! they filter and sort on. Used by tests and by memory-only mode.

use async_trait::async_trait;
use bson::{DateTime, Document};
use dashmap::DashMap;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use crate::db::collection::InstanceCollection;
use crate::db::schemas::{WorkflowInstance, WorkflowStatus, ID_FIELD};
use crate::store::InstanceQuery;
use crate::types::{Result, StoreError};

/// Projection of the queryable fields of a stored document. The rest of the
/// document is never decoded, so a record that is corrupt elsewhere can
/// still be matched, counted and deleted.
#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct QueryFields {
    #[serde(rename = "_id")]
    id: String,
    #[serde(default)]
    definition_id: String,
    #[serde(default)]
    definition_version_id: String,
    tenant_id: Option<String>,
    #[serde(default)]
    workflow_status: WorkflowStatus,
    correlation_id: Option<String>,
    context_type: Option<String>,
    context_id: Option<String>,
    name: Option<String>,
    created_at: Option<DateTime>,
    last_executed_at: Option<DateTime>,
    finished_at: Option<DateTime>,
}

impl From<QueryFields> for WorkflowInstance {
    fn from(fields: QueryFields) -> Self {
        let mut instance = WorkflowInstance::new(fields.definition_id).with_id(fields.id);
        instance.definition_version_id = fields.definition_version_id;
        instance.tenant_id = fields.tenant_id;
        instance.workflow_status = fields.workflow_status;
        instance.correlation_id = fields.correlation_id;
        instance.context_type = fields.context_type;
        instance.context_id = fields.context_id;
        instance.name = fields.name;
        instance.created_at = fields.created_at.unwrap_or(DateTime::MIN);
        instance.last_executed_at = fields.last_executed_at;
        instance.finished_at = fields.finished_at;
        instance
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryInstanceCollection {
    documents: Arc<DashMap<String, Document>>,
}

impl MemoryInstanceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw stored document, as written
    pub fn raw(&self, id: &str) -> Option<Document> {
        self.documents.get(id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn document_id(document: &Document) -> Result<String> {
        document
            .get_str(ID_FIELD)
            .map(str::to_owned)
            .map_err(|e| StoreError::Internal(format!("Document without string id: {}", e)))
    }

    /// Queryable view of every matching document, sorted and paged
    fn select(&self, query: &InstanceQuery) -> Result<Vec<WorkflowInstance>> {
        if query.has_native_filter() {
            return Err(StoreError::Unsupported(
                "native MongoDB filters need a MongoDB collection".into(),
            ));
        }

        let snapshot: Vec<Document> = self
            .documents
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        let mut matched = Vec::new();
        for document in snapshot {
            let fields: QueryFields = bson::from_document(document)?;
            let instance = WorkflowInstance::from(fields);
            if query.matches(&instance) {
                matched.push(instance);
            }
        }

        // Id order first so ties stay deterministic
        matched.sort_by(|a, b| a.id.cmp(&b.id));
        if let Some(order) = query.order {
            matched.sort_by(|a, b| order.compare(a, b));
        }

        let skip = query.skip.unwrap_or(0) as usize;
        let limit = match query.limit {
            Some(limit) if limit != 0 => limit.unsigned_abs() as usize,
            _ => usize::MAX,
        };

        Ok(matched.into_iter().skip(skip).take(limit).collect())
    }
}

#[async_trait]
impl InstanceCollection for MemoryInstanceCollection {
    async fn find_ids(&self, query: &InstanceQuery) -> Result<Vec<String>> {
        Ok(self
            .select(query)?
            .into_iter()
            .map(|instance| instance.id)
            .collect())
    }

    async fn count(&self, query: &InstanceQuery) -> Result<u64> {
        Ok(self.select(&query.unpaged())?.len() as u64)
    }

    async fn replace(&self, id: &str, document: Document, upsert: bool) -> Result<bool> {
        if upsert {
            self.documents.insert(id.to_string(), document);
            return Ok(true);
        }

        match self.documents.get_mut(id) {
            Some(mut entry) => {
                *entry = document;
                Ok(true)
            }
            None => {
                debug!(id = %id, "Replace matched no document");
                Ok(false)
            }
        }
    }

    async fn insert_many(&self, documents: Vec<Document>) -> Result<()> {
        let mut keyed = Vec::with_capacity(documents.len());
        for document in documents {
            let id = Self::document_id(&document)?;
            if self.documents.contains_key(&id) || keyed.iter().any(|(k, _)| *k == id) {
                return Err(StoreError::Database(format!("Insert failed: duplicate key {}", id)));
            }
            keyed.push((id, document));
        }

        for (id, document) in keyed {
            self.documents.insert(id, document);
        }
        Ok(())
    }

    async fn find_raw(&self, ids: &[String]) -> Result<Vec<Document>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.raw(id))
            .collect())
    }

    async fn find_one_and_delete(&self, id: &str) -> Result<Option<Document>> {
        Ok(self.documents.remove(id).map(|(_, document)| document))
    }

    async fn delete_by_ids(&self, ids: &[String]) -> Result<u64> {
        let removed = ids
            .iter()
            .filter(|id| self.documents.remove(id.as_str()).is_some())
            .count();
        Ok(removed as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::WorkflowStatus;
    use crate::store::{InstanceOrderBy, SortDirection};
    use bson::doc;

    fn document(id: &str, status: WorkflowStatus) -> Document {
        let instance = WorkflowInstance::new("def").with_id(id).with_status(status);
        bson::to_document(&instance).unwrap()
    }

    #[tokio::test]
    async fn test_replace_without_upsert_is_noop() {
        let collection = MemoryInstanceCollection::new();

        let written = collection
            .replace("missing", document("missing", WorkflowStatus::Idle), false)
            .await
            .unwrap();

        assert!(!written);
        assert!(collection.is_empty());
    }

    #[tokio::test]
    async fn test_find_ids_orders_and_pages() {
        let collection = MemoryInstanceCollection::new();
        for id in ["c", "a", "d", "b"] {
            collection.replace(id, document(id, WorkflowStatus::Running), true).await.unwrap();
        }

        let query = InstanceQuery::new()
            .order_by(InstanceOrderBy::Id, SortDirection::Descending)
            .with_skip(1)
            .with_limit(2);

        assert_eq!(collection.find_ids(&query).await.unwrap(), vec!["c", "b"]);
        assert_eq!(collection.count(&query).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_insert_many_rejects_duplicates() {
        let collection = MemoryInstanceCollection::new();
        collection.insert_many(vec![document("a", WorkflowStatus::Idle)]).await.unwrap();

        let result = collection
            .insert_many(vec![document("b", WorkflowStatus::Idle), document("a", WorkflowStatus::Idle)])
            .await;

        assert!(matches!(result, Err(StoreError::Database(_))));
        assert_eq!(collection.len(), 1);
    }

    #[tokio::test]
    async fn test_native_filter_unsupported() {
        let collection = MemoryInstanceCollection::new();
        let query = InstanceQuery::new().with_native_filter(doc! { "Version": 2 });

        assert!(matches!(
            collection.find_ids(&query).await,
            Err(StoreError::Unsupported(_))
        ));
    }

    #[tokio::test]
    async fn test_query_ignores_fields_outside_filter() {
        let collection = MemoryInstanceCollection::new();
        let mut corrupt = document("a", WorkflowStatus::Finished);
        corrupt.insert("Faults", "not-a-list");
        collection.replace("a", corrupt, true).await.unwrap();
        collection.replace("b", document("b", WorkflowStatus::Running), true).await.unwrap();

        let query = InstanceQuery::new().with_status(WorkflowStatus::Finished);
        assert_eq!(collection.find_ids(&query).await.unwrap(), vec!["a"]);
        assert_eq!(collection.count(&InstanceQuery::new()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_delete_by_ids_counts_removed() {
        let collection = MemoryInstanceCollection::new();
        collection.replace("a", document("a", WorkflowStatus::Idle), true).await.unwrap();

        let removed = collection
            .delete_by_ids(&["a".to_string(), "ghost".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 1);
    }
}
