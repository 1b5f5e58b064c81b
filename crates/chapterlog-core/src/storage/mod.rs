//! Persistent key-value backends.
//!
//! The store only needs `get` and `set` of whole JSON values under a single
//! key; anything that can provide those can back a [`StoreRepository`].
//!
//! [`StoreRepository`]: crate::StoreRepository

mod file;
mod memory;

pub use file::FileBackend;
pub use memory::MemoryBackend;

use crate::error::PersistenceError;
use async_trait::async_trait;
use serde_json::Value;

/// A key-value store holding structured values.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Read the value under `key`. An absent key is `Ok(None)`, not an error.
    async fn get(&self, key: &str) -> Result<Option<Value>, PersistenceError>;

    /// Replace the value under `key`.
    async fn set(&self, key: &str, value: Value) -> Result<(), PersistenceError>;
}
