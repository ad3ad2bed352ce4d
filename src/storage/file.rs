//! Directory-backed storage: one `<key>.json` file per key.
//!
//! Writes go to a temp file in the same directory and are renamed into place,
//! so readers in other processes never see a partial blob. Changes made by
//! other processes are detected by a poller that compares file contents with
//! what this context last wrote or observed.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{validate_key, KeyValueStore, StorageError, StorageEvent, EVENT_CAPACITY};

/// Default interval for detecting writes from other processes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

const EXTENSION: &str = "json";

#[derive(Debug)]
struct Inner {
    dir: PathBuf,
    /// Last content written or observed per key (`None` = absent).
    known: Mutex<HashMap<String, Option<String>>>,
    events: broadcast::Sender<StorageEvent>,
}

impl Inner {
    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", key, EXTENSION))
    }

    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn remember(&self, key: &str, content: Option<String>) {
        self.known
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), content);
    }

    /// Apply a disk change and record it under one lock, so a concurrent
    /// scan never sees the new file while `known` still holds the old content.
    fn commit(
        &self,
        key: &str,
        content: Option<String>,
        apply: impl FnOnce() -> Result<(), StorageError>,
    ) -> Result<(), StorageError> {
        let mut known = self.known.lock().unwrap_or_else(PoisonError::into_inner);
        apply()?;
        known.insert(key.to_string(), content);
        Ok(())
    }

    /// Keys currently present on disk.
    fn keys_on_disk(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some(EXTENSION))
            .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().to_string()))
            .filter(|k| validate_key(k).is_ok())
            .collect()
    }

    /// Compare disk against what we know and announce foreign changes.
    fn scan(&self) {
        let mut keys = self.keys_on_disk();
        {
            let known = self.known.lock().unwrap_or_else(PoisonError::into_inner);
            for key in known.keys() {
                if !keys.contains(key) {
                    keys.push(key.clone());
                }
            }
        }

        for key in keys {
            // Read under the lock so our own in-flight writes are settled first
            let changed = {
                let mut known = self.known.lock().unwrap_or_else(PoisonError::into_inner);
                let current = match self.read(&key) {
                    Ok(current) => current,
                    Err(e) => {
                        warn!("Failed to poll storage key '{}': {}", key, e);
                        continue;
                    }
                };
                if known.get(&key).cloned().flatten() == current {
                    false
                } else {
                    known.insert(key.clone(), current);
                    true
                }
            };

            if changed {
                debug!("Detected external change to '{}'", key);
                let _ = self.events.send(StorageEvent { key });
            }
        }
    }
}

/// File-backed storage context.
pub struct FileStorage {
    inner: Arc<Inner>,
    poll_interval: Duration,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl FileStorage {
    /// Open (creating if needed) a storage directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| StorageError::Io {
            key: dir.display().to_string(),
            source,
        })?;

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let inner = Arc::new(Inner {
            dir,
            known: Mutex::new(HashMap::new()),
            events,
        });

        // Baseline so pre-existing content is not reported as a change
        for key in inner.keys_on_disk() {
            let content = inner.read(&key)?;
            inner.remember(&key, content);
        }

        Ok(Self {
            inner,
            poll_interval: DEFAULT_POLL_INTERVAL,
            poller: Mutex::new(None),
        })
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.inner.dir
    }

    /// Check for external changes now instead of waiting for the poller.
    pub fn poll_now(&self) {
        self.inner.scan();
    }

    fn ensure_poller(&self) {
        let mut poller = self.poller.lock().unwrap_or_else(PoisonError::into_inner);
        if poller.is_some() {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!("No tokio runtime, external changes only seen via poll_now");
            return;
        };

        let inner = Arc::clone(&self.inner);
        let period = self.poll_interval;
        *poller = Some(handle.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let inner = Arc::clone(&inner);
                // File reads are blocking
                if tokio::task::spawn_blocking(move || inner.scan()).await.is_err() {
                    break;
                }
            }
        }));
    }
}

impl Drop for FileStorage {
    fn drop(&mut self) {
        if let Some(handle) = self
            .poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}

impl KeyValueStore for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        validate_key(key)?;
        self.inner.read(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        let io_err = |source| StorageError::Io {
            key: key.to_string(),
            source,
        };

        let mut tmp = tempfile::NamedTempFile::new_in(&self.inner.dir).map_err(io_err)?;
        tmp.write_all(value.as_bytes()).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;

        let path = self.inner.path_for(key);
        self.inner.commit(key, Some(value.to_string()), || {
            tmp.persist(path).map(|_| ()).map_err(|e| io_err(e.error))
        })
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        let path = self.inner.path_for(key);
        self.inner.commit(key, None, || match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io {
                key: key.to_string(),
                source,
            }),
        })
    }

    fn watch(&self) -> Option<broadcast::Receiver<StorageEvent>> {
        let rx = self.inner.events.subscribe();
        self.ensure_poller();
        Some(rx)
    }
}
