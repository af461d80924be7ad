//! Storage capability for evaluation backends.
//!
//! - [`KeyValueStore`]: the externally owned store (Redis wrapper, memory, ...)
//! - [`DataAdapter`]: what a backend persists its evaluation state through
//! - [`DataStore`]: the adapter that bridges the two

mod adapter;
mod memory;

pub use adapter::{DataAdapter, DataStore, KeyValueStore, StoreError};
pub use memory::MemoryStore;
