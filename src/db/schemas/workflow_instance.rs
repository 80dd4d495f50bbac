//! Workflow instance document schema
//!
//! The record written by the workflow engine. Everything except `_id` and
//! `Variables` is opaque to the storage adapter.

use bson::{doc, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;

/// Default collection name for workflow instances
pub const INSTANCE_COLLECTION: &str = "WorkflowInstances";

/// BSON field holding the record identifier
pub const ID_FIELD: &str = "_id";

/// BSON field holding serialized variable state (the offload candidate)
pub const VARIABLES_FIELD: &str = "Variables";

/// Lifecycle status of a workflow instance
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum WorkflowStatus {
    #[default]
    Idle,
    Running,
    Finished,
    Suspended,
    Faulted,
    Cancelled,
}

impl WorkflowStatus {
    /// Name as stored in MongoDB
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Running => "Running",
            Self::Finished => "Finished",
            Self::Suspended => "Suspended",
            Self::Faulted => "Faulted",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl std::str::FromStr for WorkflowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "idle" => Ok(Self::Idle),
            "running" => Ok(Self::Running),
            "finished" => Ok(Self::Finished),
            "suspended" => Ok(Self::Suspended),
            "faulted" => Ok(Self::Faulted),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown workflow status '{}'", other)),
        }
    }
}

/// An activity the instance is waiting on
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct BlockingActivity {
    pub activity_id: String,
    pub activity_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

/// A recorded fault
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct WorkflowFault {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub faulted_activity_id: Option<String>,
    pub message: String,
    #[serde(default)]
    pub resuming: bool,
}

/// Workflow instance document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct WorkflowInstance {
    /// Record identifier. Empty until first save assigns one.
    #[serde(rename = "_id", default)]
    pub id: String,

    pub definition_id: String,

    #[serde(default)]
    pub definition_version_id: String,

    #[serde(default)]
    pub version: i32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,

    #[serde(default)]
    pub workflow_status: WorkflowStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub created_at: DateTime,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_executed_at: Option<DateTime>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub faulted_at: Option<DateTime>,

    /// Serialized variable state produced by the engine. Stored inline or,
    /// when oversized, as a GridFS reference.
    #[serde(default)]
    pub variables: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,

    #[serde(default)]
    pub blocking_activities: Vec<BlockingActivity>,

    #[serde(default)]
    pub faults: Vec<WorkflowFault>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_executed_activity_id: Option<String>,
}

impl WorkflowInstance {
    /// Create a new, unsaved instance of the given definition
    pub fn new(definition_id: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            definition_id: definition_id.into(),
            definition_version_id: String::new(),
            version: 1,
            tenant_id: None,
            workflow_status: WorkflowStatus::Idle,
            correlation_id: None,
            context_type: None,
            context_id: None,
            name: None,
            created_at: DateTime::now(),
            last_executed_at: None,
            finished_at: None,
            cancelled_at: None,
            faulted_at: None,
            variables: "{}".to_string(),
            output: None,
            blocking_activities: Vec::new(),
            faults: Vec::new(),
            last_executed_activity_id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_variables(mut self, variables: impl Into<String>) -> Self {
        self.variables = variables.into();
        self
    }

    pub fn with_status(mut self, status: WorkflowStatus) -> Self {
        self.workflow_status = status;
        self
    }
}

impl IntoIndexes for WorkflowInstance {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        let named = |name: &str| Some(IndexOptions::builder().name(name.to_string()).build());

        vec![
            (doc! { "DefinitionId": 1 }, named("definition_id_index")),
            (doc! { "CorrelationId": 1 }, named("correlation_id_index")),
            (doc! { "WorkflowStatus": 1 }, named("workflow_status_index")),
            (doc! { "TenantId": 1 }, named("tenant_id_index")),
            (doc! { "ContextType": 1, "ContextId": 1 }, named("context_index")),
            (doc! { "CreatedAt": -1 }, named("created_at_index")),
        ]
    }
}
