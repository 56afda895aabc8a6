//! Storage trait definitions

use std::path::Path;
use thiserror::Error;

/// Key holding the JSON array of report records
pub const REPORTS_KEY: &str = "analystai-reports";

/// Key holding the JSON object of extracted data, keyed by report ID
pub const EXTRACTED_DATA_KEY: &str = "analystai-extracted-data";

/// Key holding the signed-in user, absent when signed out
pub const USER_KEY: &str = "analystai-user";

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for persistent key-value backends
///
/// Values are opaque strings (JSON documents in practice). Implementations
/// must be thread-safe (Send + Sync) since the store and its background
/// tasks share one backend.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Create or replace the value stored under `key`
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Delete `key`, returning whether it existed
    fn remove(&self, key: &str) -> StorageResult<bool>;
}

/// Extension trait for opening stores from paths
pub trait OpenStore: KeyValueStore + Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>) -> StorageResult<Self>;

    /// Create an in-memory store (useful for testing)
    fn open_in_memory() -> StorageResult<Self>;
}
