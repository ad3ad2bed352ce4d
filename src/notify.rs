//! Change notifications for the persisted collections.
//!
//! One publish/subscribe API covers both transports: writers in this context
//! call [`ChangeNotifier::publish`] after a committed mutation, and writes from
//! other contexts arrive through the storage change feed once
//! [`ChangeNotifier::attach_storage`] has bridged it. Subscribers see a single
//! ordered stream of [`ChangeSignal`]s either way.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::storage::KeyValueStore;

const CHANNEL_CAPACITY: usize = 256;

/// A persisted collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Documents,
    DocumentTags,
}

impl Collection {
    pub const ALL: [Collection; 2] = [Collection::Documents, Collection::DocumentTags];

    /// Storage key of the collection.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Documents => "documents",
            Self::DocumentTags => "documentTags",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "documents" => Some(Self::Documents),
            "documentTags" => Some(Self::DocumentTags),
            _ => None,
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Where a signal came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOrigin {
    /// Published by a writer in this context.
    Local,
    /// Observed in persisted storage, written by another context.
    External,
    /// The subscriber fell behind and may have missed signals; re-read.
    Resync,
}

/// A collection changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSignal {
    pub collection: Collection,
    /// Increases by one per signal sent; `0` for resync signals.
    pub seq: u64,
    pub origin: SignalOrigin,
}

struct NotifierInner {
    tx: broadcast::Sender<ChangeSignal>,
    /// Guards sequence assignment and sending so delivery follows seq order.
    seq: Mutex<u64>,
    bridges: Mutex<Vec<JoinHandle<()>>>,
}

impl NotifierInner {
    fn emit(&self, collection: Collection, origin: SignalOrigin) -> u64 {
        let mut seq = self.seq.lock().unwrap_or_else(PoisonError::into_inner);
        *seq += 1;
        let signal = ChangeSignal {
            collection,
            seq: *seq,
            origin,
        };
        // Nobody listening is not an error
        let receivers = self.tx.send(signal).unwrap_or(0);
        debug!(
            "change #{} on {} ({:?}) to {} subscribers",
            *seq, collection, origin, receivers
        );
        *seq
    }
}

impl Drop for NotifierInner {
    fn drop(&mut self) {
        for handle in self
            .bridges
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
        {
            handle.abort();
        }
    }
}

/// Broadcasts collection changes to subscribers. Cheap to clone.
#[derive(Clone)]
pub struct ChangeNotifier {
    inner: Arc<NotifierInner>,
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeNotifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(NotifierInner {
                tx,
                seq: Mutex::new(0),
                bridges: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Announce a committed change made in this context. Returns its sequence number.
    pub fn publish(&self, collection: Collection) -> u64 {
        self.inner.emit(collection, SignalOrigin::Local)
    }

    /// Register interest in one collection.
    ///
    /// Signals sent before this call are not delivered; read the collection
    /// after subscribing to start from a consistent state.
    pub fn subscribe(&self, collection: Collection) -> Subscription {
        Subscription::new(self.inner.tx.subscribe(), vec![collection])
    }

    /// Register interest in every collection.
    pub fn subscribe_all(&self) -> Subscription {
        Subscription::new(self.inner.tx.subscribe(), Collection::ALL.to_vec())
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.tx.receiver_count()
    }

    /// Forward the storage backend's external change feed as signals.
    ///
    /// Returns false when the backend has no feed or no tokio runtime is running.
    pub fn attach_storage(&self, storage: &dyn KeyValueStore) -> bool {
        let Some(mut rx) = storage.watch() else {
            debug!("Storage has no change feed, only local signals will be sent");
            return false;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("No tokio runtime, external storage changes will not be signalled");
            return false;
        };

        let weak: Weak<NotifierInner> = Arc::downgrade(&self.inner);
        let task = handle.spawn(async move {
            loop {
                let collections: Vec<Collection> = match rx.recv().await {
                    Ok(event) => Collection::from_key(&event.key).into_iter().collect(),
                    Err(RecvError::Lagged(n)) => {
                        warn!(missed = n, "Storage change feed lagged");
                        Collection::ALL.to_vec()
                    }
                    Err(RecvError::Closed) => break,
                };
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                for collection in collections {
                    inner.emit(collection, SignalOrigin::External);
                }
            }
        });

        self.inner
            .bridges
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(task);
        true
    }
}

/// Receiving end for one or more collections.
pub struct Subscription {
    rx: broadcast::Receiver<ChangeSignal>,
    collections: Vec<Collection>,
    pending: VecDeque<ChangeSignal>,
}

impl Subscription {
    fn new(rx: broadcast::Receiver<ChangeSignal>, collections: Vec<Collection>) -> Self {
        Self {
            rx,
            collections,
            pending: VecDeque::new(),
        }
    }

    fn resync(&mut self, missed: u64) {
        warn!(missed, "Change subscriber lagged, requesting resync");
        self.pending.extend(self.collections.iter().map(|&collection| ChangeSignal {
            collection,
            seq: 0,
            origin: SignalOrigin::Resync,
        }));
    }

    /// Wait for the next signal for a subscribed collection.
    ///
    /// Returns `None` once the notifier is gone.
    pub async fn recv(&mut self) -> Option<ChangeSignal> {
        loop {
            if let Some(signal) = self.pending.pop_front() {
                return Some(signal);
            }
            match self.rx.recv().await {
                Ok(signal) if self.collections.contains(&signal.collection) => {
                    return Some(signal)
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(n)) => self.resync(n),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<ChangeSignal> {
        use broadcast::error::TryRecvError;

        loop {
            if let Some(signal) = self.pending.pop_front() {
                return Some(signal);
            }
            match self.rx.try_recv() {
                Ok(signal) if self.collections.contains(&signal.collection) => {
                    return Some(signal)
                }
                Ok(_) => continue,
                Err(TryRecvError::Lagged(n)) => self.resync(n),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use std::time::Duration;

    #[test]
    fn test_collection_keys() {
        for c in Collection::ALL {
            assert_eq!(Collection::from_key(c.key()), Some(c));
        }
        assert_eq!(Collection::from_key("other"), None);
    }

    #[test]
    fn test_filtered_and_ordered() {
        let notifier = ChangeNotifier::new();
        let mut docs = notifier.subscribe(Collection::Documents);
        let mut all = notifier.subscribe_all();

        notifier.publish(Collection::Documents);
        notifier.publish(Collection::DocumentTags);
        notifier.publish(Collection::Documents);

        let seqs: Vec<u64> = std::iter::from_fn(|| docs.try_recv()).map(|s| s.seq).collect();
        assert_eq!(seqs, vec![1, 3]);

        let seqs: Vec<u64> = std::iter::from_fn(|| all.try_recv()).map(|s| s.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
    }

    #[test]
    fn test_late_subscriber_misses_earlier_signals() {
        let notifier = ChangeNotifier::new();
        notifier.publish(Collection::Documents);
        let mut sub = notifier.subscribe(Collection::Documents);
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn test_lag_becomes_resync() {
        let notifier = ChangeNotifier::new();
        let mut sub = notifier.subscribe(Collection::DocumentTags);
        for _ in 0..(CHANNEL_CAPACITY + 10) {
            notifier.publish(Collection::DocumentTags);
        }
        let first = sub.try_recv().unwrap();
        assert_eq!(first.origin, SignalOrigin::Resync);
        assert_eq!(first.collection, Collection::DocumentTags);
    }

    #[tokio::test]
    async fn test_recv_ends_when_notifier_dropped() {
        let notifier = ChangeNotifier::new();
        let mut sub = notifier.subscribe(Collection::Documents);
        drop(notifier);
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_bridges_other_context_writes() {
        let ours = MemoryStorage::new();
        let theirs = ours.context();

        let notifier = ChangeNotifier::new();
        assert!(notifier.attach_storage(&ours));
        let mut sub = notifier.subscribe(Collection::Documents);

        theirs.set("documents", "[]").unwrap();
        let signal = tokio::time::timeout(Duration::from_secs(5), sub.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(signal.origin, SignalOrigin::External);

        // Our own writes are not echoed
        ours.set("documents", "[1]").unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(sub.try_recv().is_none());
    }
}
