//! In-memory storage shared between contexts of one process.
//!
//! Every handle created with [`MemoryStorage::context`] sees the same map, and
//! a write in one context is announced to all the others.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::sync::broadcast;
use tracing::debug;

use super::{validate_key, KeyValueStore, StorageError, StorageEvent, EVENT_CAPACITY};

#[derive(Debug)]
struct Shared {
    entries: RwLock<HashMap<String, String>>,
    /// Change feed per live context.
    contexts: Mutex<Vec<(u64, broadcast::Sender<StorageEvent>)>>,
    next_context: AtomicU64,
    /// Total bytes (keys + values) allowed, like a browser storage quota.
    quota: Option<usize>,
}

/// One context onto a shared in-memory map.
#[derive(Debug)]
pub struct MemoryStorage {
    shared: Arc<Shared>,
    context: u64,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Storage that rejects writes once the total size would exceed `limit` bytes.
    pub fn with_quota(limit: usize) -> Self {
        Self::build(Some(limit))
    }

    fn build(quota: Option<usize>) -> Self {
        let shared = Arc::new(Shared {
            entries: RwLock::new(HashMap::new()),
            contexts: Mutex::new(Vec::new()),
            next_context: AtomicU64::new(0),
            quota,
        });
        Self::attach(shared)
    }

    fn attach(shared: Arc<Shared>) -> Self {
        let context = shared.next_context.fetch_add(1, Ordering::Relaxed);
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        shared
            .contexts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((context, tx));
        Self { shared, context }
    }

    /// Open another context onto the same data.
    pub fn context(&self) -> Self {
        Self::attach(Arc::clone(&self.shared))
    }

    fn announce(&self, key: &str) {
        let contexts = self
            .shared
            .contexts
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for (id, tx) in contexts.iter() {
            if *id != self.context {
                // No receivers is fine
                let _ = tx.send(StorageEvent {
                    key: key.to_string(),
                });
            }
        }
        debug!("memory storage context {} changed '{}'", self.context, key);
    }
}

impl Drop for MemoryStorage {
    fn drop(&mut self) {
        self.shared
            .contexts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(id, _)| *id != self.context);
    }
}

impl KeyValueStore for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        validate_key(key)?;
        let entries = self
            .shared
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        {
            let mut entries = self
                .shared
                .entries
                .write()
                .unwrap_or_else(PoisonError::into_inner);

            if let Some(limit) = self.shared.quota {
                let others: usize = entries
                    .iter()
                    .filter(|(k, _)| k.as_str() != key)
                    .map(|(k, v)| k.len() + v.len())
                    .sum();
                let needed = others + key.len() + value.len();
                if needed > limit {
                    return Err(StorageError::QuotaExceeded {
                        key: key.to_string(),
                        needed,
                        limit,
                    });
                }
            }

            if entries.get(key).map(String::as_str) == Some(value) {
                return Ok(());
            }
            entries.insert(key.to_string(), value.to_string());
        }
        self.announce(key);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        let removed = self
            .shared
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some();
        if removed {
            self.announce(key);
        }
        Ok(())
    }

    fn watch(&self) -> Option<broadcast::Receiver<StorageEvent>> {
        let contexts = self
            .shared
            .contexts
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        contexts
            .iter()
            .find(|(id, _)| *id == self.context)
            .map(|(_, tx)| tx.subscribe())
    }
}
