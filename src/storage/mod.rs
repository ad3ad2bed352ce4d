//! Persisted key-value layer underneath the document store.
//!
//! Values are whole JSON blobs, one per collection. Each storage handle is a
//! *context*: writes are visible to every context immediately, and backends
//! that can observe other contexts expose a change feed through
//! [`KeyValueStore::watch`]. A context is never notified of its own writes.

mod file;
mod memory;

use thiserror::Error;
use tokio::sync::broadcast;

pub use file::FileStorage;
pub use memory::MemoryStorage;

/// Capacity of change-feed channels.
pub(crate) const EVENT_CAPACITY: usize = 64;

/// Errors from the persisted layer.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error on '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Storage quota exceeded writing '{key}': {needed} bytes needed, {limit} allowed")]
    QuotaExceeded {
        key: String,
        needed: usize,
        limit: usize,
    },

    #[error("Invalid storage key '{0}'")]
    InvalidKey(String),
}

/// A key changed in another context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: String,
}

/// Synchronous key-value persistence. A successful `set` is durable when it returns.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Feed of changes made by other contexts, if the backend can observe them.
    fn watch(&self) -> Option<broadcast::Receiver<StorageEvent>>;
}

/// Keys become file names, so keep them to a safe alphabet.
pub(crate) fn validate_key(key: &str) -> Result<(), StorageError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}
