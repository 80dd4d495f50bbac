//! Document database access

mod collection;
mod memory;
pub mod mongo;
pub mod schemas;

pub use collection::InstanceCollection;
pub use memory::MemoryInstanceCollection;
pub use mongo::{IntoIndexes, MongoClient, MongoInstanceCollection};
