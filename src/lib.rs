//! Instance Store - workflow-instance persistence on MongoDB
//!
//! Stores workflow instances as MongoDB documents. Serialized variable state
//! too large to keep inline is moved to a GridFS bucket and replaced in the
//! document by a `GRIDFS/{id}` reference, keeping every document far below
//! MongoDB's 16 MiB ceiling.
//!
//! ## Components
//!
//! - **Blob**: key-addressed blob storage (GridFS, in-memory)
//! - **DB**: MongoDB client, instance schema, typed/raw collection access
//! - **Store**: payload codec, rehydration and the public `InstanceStore`

pub mod blob;
pub mod config;
pub mod db;
pub mod store;
pub mod types;

pub use config::{Args, StoreConfig};
pub use db::schemas::{WorkflowInstance, WorkflowStatus};
pub use store::{InstanceQuery, InstanceStore};
pub use types::{Result, StoreError};
