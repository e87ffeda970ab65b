use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use super::{KeyValueStore, StorageError};

/// In-memory store, shared between clones
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<BTreeMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every entry, mostly useful in tests
    pub fn entries(&self) -> Result<BTreeMap<String, String>, StorageError> {
        let inner = self.inner.read().map_err(|e| {
            StorageError::Backend(format!("failed to acquire read lock: {}", e))
        })?;
        Ok(inner.clone())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let inner = self.inner.read().map_err(|e| {
            StorageError::Backend(format!("failed to acquire read lock: {}", e))
        })?;
        Ok(inner.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut inner = self.inner.write().map_err(|e| {
            StorageError::Backend(format!("failed to acquire write lock: {}", e))
        })?;
        inner.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut inner = self.inner.write().map_err(|e| {
            StorageError::Backend(format!("failed to acquire write lock: {}", e))
        })?;
        inner.remove(key);
        Ok(())
    }

    async fn remove_prefix(&self, prefix: &str) -> Result<(), StorageError> {
        let mut inner = self.inner.write().map_err(|e| {
            StorageError::Backend(format!("failed to acquire write lock: {}", e))
        })?;
        inner.retain(|key, _| !key.starts_with(prefix));
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_set_get_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get("a").await.unwrap(), None);

        store.set("a", "1").await.unwrap();
        store.set("a", "2").await.unwrap();
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("2"));

        store.remove("a").await.unwrap();
        store.remove("a").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_clones_share_entries() {
        let store = MemoryStore::new();
        let other = store.clone();
        store.set("k", "v").await.unwrap();
        assert_eq!(other.get("k").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_remove_prefix() {
        let store = MemoryStore::new();
        store.set("app:mod:a", "1").await.unwrap();
        store.set("app:mod:b", "2").await.unwrap();
        store.set("app:other:a", "3").await.unwrap();

        store.remove_prefix("app:mod:").await.unwrap();
        let keys: Vec<_> = store.entries().unwrap().into_keys().collect();
        assert_eq!(keys, vec!["app:other:a".to_string()]);
    }
}
