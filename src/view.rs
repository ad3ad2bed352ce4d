//! Read-only snapshots of a collection that follow change signals.
//!
//! A view subscribes before its initial read, so a change committed between
//! the two is never lost: it either shows up in the initial read or arrives
//! as a signal afterwards. Every signal triggers a full re-read. An optional
//! poll interval re-reads even without signals. Dropping the view stops its
//! background task.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, warn};

use crate::models::{ProcessedDocument, Tag};
use crate::notify::Collection;
use crate::store::{DocumentStore, StoreError};

type Loader<T> = fn(&DocumentStore) -> Result<Vec<T>, StoreError>;

/// A continuously refreshed copy of one collection.
pub struct SnapshotView<T> {
    rx: watch::Receiver<Arc<Vec<T>>>,
    task: JoinHandle<()>,
}

impl SnapshotView<ProcessedDocument> {
    /// Follow the documents collection. Must be called inside a tokio runtime.
    pub fn documents(
        store: Arc<DocumentStore>,
        poll_interval: Option<Duration>,
    ) -> Result<Self, StoreError> {
        Self::spawn(store, Collection::Documents, DocumentStore::documents, poll_interval)
    }
}

impl SnapshotView<Tag> {
    /// Follow the tag catalog. Must be called inside a tokio runtime.
    pub fn tags(
        store: Arc<DocumentStore>,
        poll_interval: Option<Duration>,
    ) -> Result<Self, StoreError> {
        Self::spawn(store, Collection::DocumentTags, DocumentStore::tags, poll_interval)
    }
}

impl<T> SnapshotView<T>
where
    T: PartialEq + Send + Sync + 'static,
{
    fn spawn(
        store: Arc<DocumentStore>,
        collection: Collection,
        load: Loader<T>,
        poll_interval: Option<Duration>,
    ) -> Result<Self, StoreError> {
        let mut subscription = store.notifier().subscribe(collection);
        let initial = load(&store)?;
        let (tx, rx) = watch::channel(Arc::new(initial));

        let mut poll: Option<Interval> = poll_interval.map(|period| {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    signal = subscription.recv() => {
                        let Some(signal) = signal else {
                            debug!("Notifier for {} closed, view stopping", collection);
                            break;
                        };
                        debug!("Refreshing {} view after change #{}", collection, signal.seq);
                    }
                    _ = next_tick(&mut poll) => {
                        debug!("Periodic refresh of {} view", collection);
                    }
                    _ = tx.closed() => break,
                }

                match load(&store) {
                    Ok(items) => {
                        tx.send_if_modified(|current| {
                            if **current == items {
                                false
                            } else {
                                *current = Arc::new(items);
                                true
                            }
                        });
                    }
                    Err(e) => warn!("Failed to refresh {} view: {}", collection, e),
                }
            }
        });

        Ok(Self { rx, task })
    }

    /// The latest snapshot.
    pub fn current(&self) -> Arc<Vec<T>> {
        Arc::clone(&self.rx.borrow())
    }

    /// Wait until the snapshot changes and return it. `None` once the view has stopped.
    pub async fn changed(&mut self) -> Option<Arc<Vec<T>>> {
        self.rx.changed().await.ok()?;
        Some(Arc::clone(&self.rx.borrow_and_update()))
    }
}

impl<T> Drop for SnapshotView<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn next_tick(poll: &mut Option<Interval>) {
    match poll {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
