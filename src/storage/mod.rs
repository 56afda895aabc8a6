//! Storage backends for the report store
//!
//! The store persists through the `KeyValueStore` trait. `SqliteStore` is
//! the durable implementation; `MemoryStore` keeps everything in process.

mod memory;
mod sqlite;
mod traits;

pub use memory::MemoryStore;
#[cfg(test)]
pub(crate) use memory::FailingStore;
pub use sqlite::SqliteStore;
pub use traits::{
    KeyValueStore, OpenStore, StorageError, StorageResult, EXTRACTED_DATA_KEY, REPORTS_KEY,
    USER_KEY,
};
