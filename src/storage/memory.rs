//! In-process key-value backend

use super::traits::{KeyValueStore, StorageResult};
use dashmap::DashMap;

/// Key-value store that lives only as long as the process
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.get(key).map(|v| v.clone()))
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<bool> {
        Ok(self.entries.remove(key).is_some())
    }
}

/// Memory store whose writes to chosen keys fail on demand
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct FailingStore {
    inner: MemoryStore,
    failing: std::sync::Mutex<std::collections::HashSet<String>>,
}

#[cfg(test)]
impl FailingStore {
    /// Make every later `set`/`remove` of `key` fail
    pub(crate) fn fail_writes(&self, key: &str) {
        self.failing.lock().unwrap().insert(key.to_string());
    }

    pub(crate) fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    fn check(&self, key: &str) -> StorageResult<()> {
        if self.failing.lock().unwrap().contains(key) {
            return Err(std::io::Error::other(format!("write to {} refused", key)).into());
        }
        Ok(())
    }
}

#[cfg(test)]
impl KeyValueStore for FailingStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.check(key)?;
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> StorageResult<bool> {
        self.check(key)?;
        self.inner.remove(key)
    }
}
