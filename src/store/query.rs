//! Instance query value object
//!
//! Captures filter, ordering and paging for set queries. Backends translate it
//! to native MongoDB syntax (`to_filter` / `to_sort`) or evaluate it directly
//! (`matches` / `compare`).

use bson::{doc, Bson, DateTime, Document};
use std::cmp::Ordering;

use crate::db::schemas::{WorkflowInstance, WorkflowStatus, ID_FIELD};

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    fn as_i32(&self) -> i32 {
        match self {
            Self::Ascending => 1,
            Self::Descending => -1,
        }
    }
}

/// Sortable instance fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceOrderBy {
    Id,
    Name,
    CreatedAt,
    LastExecutedAt,
    FinishedAt,
}

impl InstanceOrderBy {
    /// BSON field name of the sort key
    pub fn field(&self) -> &'static str {
        match self {
            Self::Id => ID_FIELD,
            Self::Name => "Name",
            Self::CreatedAt => "CreatedAt",
            Self::LastExecutedAt => "LastExecutedAt",
            Self::FinishedAt => "FinishedAt",
        }
    }
}

impl std::str::FromStr for InstanceOrderBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "id" => Ok(Self::Id),
            "name" => Ok(Self::Name),
            "createdat" | "created" => Ok(Self::CreatedAt),
            "lastexecutedat" | "lastexecuted" => Ok(Self::LastExecutedAt),
            "finishedat" | "finished" => Ok(Self::FinishedAt),
            other => Err(format!("unknown order field '{}'", other)),
        }
    }
}

/// Ordering of a set query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceOrder {
    pub by: InstanceOrderBy,
    pub direction: SortDirection,
}

impl InstanceOrder {
    /// Compare two instances under this ordering
    pub fn compare(&self, a: &WorkflowInstance, b: &WorkflowInstance) -> Ordering {
        let ordering = match self.by {
            InstanceOrderBy::Id => a.id.cmp(&b.id),
            InstanceOrderBy::Name => a.name.cmp(&b.name),
            InstanceOrderBy::CreatedAt => a.created_at.cmp(&b.created_at),
            InstanceOrderBy::LastExecutedAt => a.last_executed_at.cmp(&b.last_executed_at),
            InstanceOrderBy::FinishedAt => a.finished_at.cmp(&b.finished_at),
        };

        match self.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

/// Filter criteria. All set criteria must match.
#[derive(Debug, Clone, Default)]
pub struct InstanceFilter {
    pub ids: Option<Vec<String>>,
    pub definition_id: Option<String>,
    pub definition_version_id: Option<String>,
    pub tenant_id: Option<String>,
    pub correlation_id: Option<String>,
    pub context_type: Option<String>,
    pub context_id: Option<String>,
    pub statuses: Option<Vec<WorkflowStatus>>,
    pub name: Option<String>,
    pub created_before: Option<DateTime>,
    pub created_after: Option<DateTime>,

    /// Raw MongoDB filter merged underneath the typed criteria. Only
    /// backends speaking MongoDB can evaluate it.
    pub native: Option<Document>,
}

/// Filter, ordering and paging for instance queries
#[derive(Debug, Clone, Default)]
pub struct InstanceQuery {
    pub filter: InstanceFilter,
    pub order: Option<InstanceOrder>,
    pub skip: Option<u64>,
    pub limit: Option<i64>,
}

impl InstanceQuery {
    /// Query matching every instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by_id(id: impl Into<String>) -> Self {
        Self::by_ids(vec![id.into()])
    }

    pub fn by_ids(ids: Vec<String>) -> Self {
        let mut query = Self::new();
        query.filter.ids = Some(ids);
        query
    }

    pub fn by_definition(definition_id: impl Into<String>) -> Self {
        let mut query = Self::new();
        query.filter.definition_id = Some(definition_id.into());
        query
    }

    pub fn with_definition_version(mut self, definition_version_id: impl Into<String>) -> Self {
        self.filter.definition_version_id = Some(definition_version_id.into());
        self
    }

    pub fn with_status(self, status: WorkflowStatus) -> Self {
        self.with_statuses(vec![status])
    }

    pub fn with_statuses(mut self, statuses: Vec<WorkflowStatus>) -> Self {
        self.filter.statuses = Some(statuses);
        self
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.filter.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.filter.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn with_context(mut self, context_type: impl Into<String>, context_id: impl Into<String>) -> Self {
        self.filter.context_type = Some(context_type.into());
        self.filter.context_id = Some(context_id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.filter.name = Some(name.into());
        self
    }

    pub fn created_before(mut self, at: DateTime) -> Self {
        self.filter.created_before = Some(at);
        self
    }

    pub fn created_after(mut self, at: DateTime) -> Self {
        self.filter.created_after = Some(at);
        self
    }

    /// Add a raw MongoDB filter
    pub fn with_native_filter(mut self, filter: Document) -> Self {
        self.filter.native = Some(filter);
        self
    }

    pub fn order_by(mut self, by: InstanceOrderBy, direction: SortDirection) -> Self {
        self.order = Some(InstanceOrder { by, direction });
        self
    }

    /// Add skip for pagination
    pub fn with_skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Add limit
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Same filter and ordering, restricted to the first match
    pub fn first(&self) -> Self {
        Self {
            limit: Some(1),
            ..self.clone()
        }
    }

    /// Same filter, without ordering or paging
    pub fn unpaged(&self) -> Self {
        Self {
            filter: self.filter.clone(),
            ..Default::default()
        }
    }

    pub fn has_native_filter(&self) -> bool {
        self.filter.native.is_some()
    }

    /// Convert to MongoDB filter document
    pub fn to_filter(&self) -> Document {
        let f = &self.filter;
        let mut filter = f.native.clone().unwrap_or_else(|| doc! {});

        if let Some(ref ids) = f.ids {
            filter.insert(ID_FIELD, doc! { "$in": ids.clone() });
        }
        if let Some(ref definition_id) = f.definition_id {
            filter.insert("DefinitionId", definition_id.as_str());
        }
        if let Some(ref version_id) = f.definition_version_id {
            filter.insert("DefinitionVersionId", version_id.as_str());
        }
        if let Some(ref tenant_id) = f.tenant_id {
            filter.insert("TenantId", tenant_id.as_str());
        }
        if let Some(ref correlation_id) = f.correlation_id {
            filter.insert("CorrelationId", correlation_id.as_str());
        }
        if let Some(ref context_type) = f.context_type {
            filter.insert("ContextType", context_type.as_str());
        }
        if let Some(ref context_id) = f.context_id {
            filter.insert("ContextId", context_id.as_str());
        }
        if let Some(ref statuses) = f.statuses {
            let names: Vec<Bson> = statuses.iter().map(|s| Bson::from(s.as_str())).collect();
            filter.insert("WorkflowStatus", doc! { "$in": names });
        }
        if let Some(ref name) = f.name {
            filter.insert("Name", name.as_str());
        }

        let mut created = Document::new();
        if let Some(before) = f.created_before {
            created.insert("$lt", before);
        }
        if let Some(after) = f.created_after {
            created.insert("$gt", after);
        }
        if !created.is_empty() {
            filter.insert("CreatedAt", created);
        }

        filter
    }

    /// Convert ordering to a MongoDB sort document
    pub fn to_sort(&self) -> Option<Document> {
        self.order.map(|order| {
            let field = order.by.field();
            doc! { field: order.direction.as_i32() }
        })
    }

    /// Evaluate the typed criteria against an instance. The native filter is
    /// not considered here.
    pub fn matches(&self, instance: &WorkflowInstance) -> bool {
        let f = &self.filter;

        if let Some(ref ids) = f.ids {
            if !ids.contains(&instance.id) {
                return false;
            }
        }
        if let Some(ref definition_id) = f.definition_id {
            if instance.definition_id != *definition_id {
                return false;
            }
        }
        if let Some(ref version_id) = f.definition_version_id {
            if instance.definition_version_id != *version_id {
                return false;
            }
        }
        if f.tenant_id.is_some() && instance.tenant_id != f.tenant_id {
            return false;
        }
        if f.correlation_id.is_some() && instance.correlation_id != f.correlation_id {
            return false;
        }
        if f.context_type.is_some() && instance.context_type != f.context_type {
            return false;
        }
        if f.context_id.is_some() && instance.context_id != f.context_id {
            return false;
        }
        if let Some(ref statuses) = f.statuses {
            if !statuses.contains(&instance.workflow_status) {
                return false;
            }
        }
        if f.name.is_some() && instance.name != f.name {
            return false;
        }
        if let Some(before) = f.created_before {
            if instance.created_at >= before {
                return false;
            }
        }
        if let Some(after) = f.created_after {
            if instance.created_at <= after {
                return false;
            }
        }

        true
    }
}
