use super::{KeyValueStore, StorageError};

/// Namespaced view over a [`KeyValueStore`]
///
/// Keys are stored as `<scope>:<key>` or `<scope>:<module>:<key>`, so
/// several components can share one backend and be cleared independently.
#[derive(Debug, Clone)]
pub struct ScopedStorage<S> {
    store: S,
    scope: String,
    module: Option<String>,
}

impl<S> ScopedStorage<S>
where
    S: KeyValueStore,
{
    pub fn new(store: S, scope: impl Into<String>, module: Option<String>) -> Self {
        Self {
            store,
            scope: scope.into(),
            module,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn scoped_key(&self, key: &str) -> String {
        match &self.module {
            Some(module) => format!("{}:{}:{}", self.scope, module, key),
            None => format!("{}:{}", self.scope, key),
        }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.store.get(&self.scoped_key(key)).await
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.store.set(&self.scoped_key(key), value).await
    }

    pub async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.store.remove(&self.scoped_key(key)).await
    }

    /// Remove every key in this scope (and module, if any)
    pub async fn clear(&self) -> Result<(), StorageError> {
        self.store.remove_prefix(&self.scoped_key("")).await
    }
}
