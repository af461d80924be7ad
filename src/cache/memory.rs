//! Process-local key-value store.

use async_trait::async_trait;
use dashmap::DashMap;

use super::adapter::{KeyValueStore, StoreError};

/// A [`KeyValueStore`] kept in process memory.
///
/// Used for local runs and tests; production deployments supply their own
/// store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
