//! In-memory key-value store

use std::collections::HashMap;

use tokio::sync::RwLock;

use super::KeyValueStore;
use crate::error::Result;

/// Process-local [`KeyValueStore`]. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `entries`.
    pub fn with_entries(entries: &[(&str, &str)]) -> Self {
        let values = entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self {
            values: RwLock::new(values),
        }
    }
}

#[async_trait::async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set_many(&self, entries: &[(&str, &str)]) -> Result<()> {
        let mut values = self.values.write().await;
        for (k, v) in entries {
            values.insert(k.to_string(), v.to_string());
        }
        Ok(())
    }

    async fn remove_many(&self, keys: &[&str]) -> Result<()> {
        let mut values = self.values.write().await;
        for k in keys {
            values.remove(*k);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_then_get() {
        let store = MemoryStore::new();
        store.set_many(&[("a", "1"), ("b", "2")]).await.unwrap();
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("1"));
        assert_eq!(store.get("b").await.unwrap().as_deref(), Some("2"));
        assert!(store.get("c").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove_absent_key_is_noop() {
        let store = MemoryStore::with_entries(&[("a", "1")]);
        store.remove_many(&["a", "missing"]).await.unwrap();
        assert!(store.get("a").await.unwrap().is_none());
    }
}
