//! Database schemas
//!
//! Defines the MongoDB document structures persisted by the store.

mod workflow_instance;

pub use workflow_instance::{
    BlockingActivity, WorkflowFault, WorkflowInstance, WorkflowStatus, ID_FIELD,
    INSTANCE_COLLECTION, VARIABLES_FIELD,
};
