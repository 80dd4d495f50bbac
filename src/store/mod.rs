//! Hybrid instance storage
//!
//! ```text
//! save/update:          WorkflowInstance ─► InstanceCodec ─► (blob put) ─► raw write
//! add_many:             WorkflowInstances ─► InstanceCodec ─► batch insert ─► (blob puts)
//! find_one/find_many:    InstanceQuery ─► typed id query ─► raw fetch
//!                            ─► Rehydrator ─► InstanceCodec ─► WorkflowInstance
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! let mongo = MongoClient::new("mongodb://localhost:27017", "workflows").await?;
//! let store = InstanceStore::connect(&mongo, &StoreConfig::default()).await?;
//!
//! let saved = store.save(WorkflowInstance::new("order-flow")).await?;
//! let loaded = store.find_by_id(&saved.id).await?;
//! ```

mod codec;
mod id;
mod instance_store;
mod query;
mod rehydrate;

pub use codec::{
    blob_key, is_blob_reference, EncodedInstance, InstanceCodec, Offload, BLOB_KEY_PREFIX,
    DEFAULT_OFFLOAD_THRESHOLD,
};
pub use id::{IdGenerator, UuidGenerator};
pub use instance_store::InstanceStore;
pub use query::{InstanceFilter, InstanceOrder, InstanceOrderBy, InstanceQuery, SortDirection};
pub use rehydrate::{Rehydrator, MISSING_BLOB_FALLBACK};
