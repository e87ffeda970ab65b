//! Key-value persistence for the little state that outlives a session
//!
//! The only durable entry today is the signer kind chosen last time. Stores
//! are injected into the signer session so tests can use [`MemoryStore`]
//! while the CLI keeps a [`FileStore`] next to its config.

mod file;
mod memory;
mod scoped;

use std::fmt::Debug;

use async_trait::async_trait;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use scoped::ScopedStorage;

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage file is not valid json: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// A flat string to string store
///
/// Reads may run concurrently. Writes are last-writer-wins.
#[async_trait]
pub trait KeyValueStore: Send + Sync + Debug + Clone + 'static {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`; removing a missing key is not an error
    async fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Remove every key starting with `prefix`
    async fn remove_prefix(&self, prefix: &str) -> Result<(), StorageError>;
}
