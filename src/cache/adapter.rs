//! Storage capability handed to evaluation backends.
//!
//! Backends persist their evaluation state through a [`DataAdapter`]. The
//! adapter shipped here, [`DataStore`], delegates to an externally owned
//! [`KeyValueStore`] and adds nothing of its own: no retries, no TTLs, no
//! eviction.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key-value store unavailable: {0}")]
    Unavailable(String),
    #[error("key-value store rejected `{key}`: {message}")]
    Rejected { key: String, message: String },
}

impl StoreError {
    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// An externally owned key-value store, e.g. a Redis client wrapper.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Prepare the store for use. Most stores need no setup.
    async fn initialize(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// The storage capability an evaluation backend expects.
///
/// `get` distinguishes an absent key (`None`) from a stored empty string.
#[async_trait]
pub trait DataAdapter: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    async fn initialize(&self) -> Result<(), StoreError>;

    async fn shutdown(&self) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct DataStore {
    store: Arc<dyn KeyValueStore>,
}

impl DataStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl DataAdapter for DataStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.store.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.store.set(key, value).await
    }

    async fn initialize(&self) -> Result<(), StoreError> {
        self.store.initialize().await
    }

    async fn shutdown(&self) -> Result<(), StoreError> {
        self.store.shutdown().await
    }
}
