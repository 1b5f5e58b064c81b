//! In-process key-value store.

use super::Backend;
use crate::error::PersistenceError;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;

/// Keeps values in a map; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    values: RwLock<HashMap<String, Value>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a backend with one value, e.g. a legacy document in tests.
    pub fn with_value(key: impl Into<String>, value: Value) -> Self {
        let backend = Self::new();
        backend.values.write().insert(key.into(), value);
        backend
    }

    /// Current raw value under `key`.
    pub fn raw(&self, key: &str) -> Option<Value> {
        self.values.read().get(key).cloned()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Value>, PersistenceError> {
        Ok(self.values.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), PersistenceError> {
        self.values.write().insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_get_set() {
        let backend = MemoryBackend::new();
        assert!(backend.get("k").await.unwrap().is_none());

        backend.set("k", json!({"entries": []})).await.unwrap();
        assert_eq!(backend.get("k").await.unwrap(), Some(json!({"entries": []})));
        assert_eq!(backend.raw("k"), Some(json!({"entries": []})));
    }

    #[tokio::test]
    async fn test_with_value() {
        let backend = MemoryBackend::with_value("k", json!(1));
        assert_eq!(backend.get("k").await.unwrap(), Some(json!(1)));
    }
}
