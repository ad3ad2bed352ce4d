//! Document store: the persisted documents and the global tag catalog.
//!
//! Every read goes to the storage layer, so a store handle always sees what
//! other contexts committed. Mutations are serialized per handle, durable when
//! they return, and followed by a change signal for each collection they
//! touched.
//!
//! Catalog rules:
//! - no two catalog tags share a name case-insensitively
//! - every tag on a document references a catalog id
//! - deleting a document drops catalog tags no remaining document references

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::models::{
    name_key, DocumentStatus, NewDocument, ProcessedDocument, Tag, TagCategory,
};
use crate::notify::{ChangeNotifier, Collection};
use crate::storage::{KeyValueStore, StorageError};

/// Errors from document store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Failed to serialize {collection}: {source}")]
    Serialize {
        collection: Collection,
        #[source]
        source: serde_json::Error,
    },

    #[error("Document {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: &'static str,
        to: &'static str,
    },

    #[error("Tag name must not be empty")]
    EmptyTagName,
}

/// Handle onto the persisted collections.
pub struct DocumentStore {
    storage: Arc<dyn KeyValueStore>,
    notifier: ChangeNotifier,
    write_lock: Mutex<()>,
}

impl DocumentStore {
    /// Open the store: bridge external storage changes into the notifier and
    /// reset any collection whose blob no longer parses.
    pub fn open(
        storage: Arc<dyn KeyValueStore>,
        notifier: ChangeNotifier,
    ) -> Result<Self, StoreError> {
        notifier.attach_storage(storage.as_ref());

        let store = Self {
            storage,
            notifier,
            write_lock: Mutex::new(()),
        };

        {
            let _guard = store.lock();
            store.repair::<ProcessedDocument>(Collection::Documents)?;
            store.repair::<Tag>(Collection::DocumentTags)?;
        }

        Ok(store)
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn repair<T: DeserializeOwned>(&self, collection: Collection) -> Result<(), StoreError> {
        let Some(raw) = self.storage.get(collection.key())? else {
            return Ok(());
        };
        if let Err(e) = serde_json::from_str::<Vec<T>>(&raw) {
            error!(
                "Persisted {} is unreadable ({}), resetting to an empty collection",
                collection, e
            );
            self.storage.set(collection.key(), "[]")?;
            self.notifier.publish(collection);
        }
        Ok(())
    }

    fn load<T: DeserializeOwned>(&self, collection: Collection) -> Result<Vec<T>, StoreError> {
        let Some(raw) = self.storage.get(collection.key())? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str(&raw) {
            Ok(items) => Ok(items),
            Err(e) => {
                warn!("Persisted {} is unreadable, treating as empty: {}", collection, e);
                Ok(Vec::new())
            }
        }
    }

    fn save<T: Serialize>(&self, collection: Collection, items: &[T]) -> Result<(), StoreError> {
        let raw = serde_json::to_string(items)
            .map_err(|source| StoreError::Serialize { collection, source })?;
        self.storage.set(collection.key(), &raw)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// All documents in upload order.
    pub fn documents(&self) -> Result<Vec<ProcessedDocument>, StoreError> {
        self.load(Collection::Documents)
    }

    /// The tag catalog.
    pub fn tags(&self) -> Result<Vec<Tag>, StoreError> {
        self.load(Collection::DocumentTags)
    }

    pub fn get_document(&self, id: &str) -> Result<Option<ProcessedDocument>, StoreError> {
        Ok(self.documents()?.into_iter().find(|d| d.id == id))
    }

    pub fn get_tag(&self, id: &str) -> Result<Option<Tag>, StoreError> {
        Ok(self.tags()?.into_iter().find(|t| t.id == id))
    }

    /// Documents whose title, summary or tag names contain `query` (case-insensitive).
    pub fn search(&self, query: &str) -> Result<Vec<ProcessedDocument>, StoreError> {
        Ok(self
            .documents()?
            .into_iter()
            .filter(|d| d.matches_query(query))
            .collect())
    }

    pub fn tags_by_category(&self, category: TagCategory) -> Result<Vec<Tag>, StoreError> {
        Ok(self
            .tags()?
            .into_iter()
            .filter(|t| t.category == category)
            .collect())
    }

    /// Number of documents referencing each catalog tag id.
    pub fn usage_counts(&self) -> Result<HashMap<String, usize>, StoreError> {
        let mut counts: HashMap<String, usize> =
            self.tags()?.into_iter().map(|t| (t.id, 0)).collect();

        for doc in self.documents()? {
            let ids: HashSet<&str> = doc.tags.iter().map(|t| t.id.as_str()).collect();
            for id in ids {
                *counts.entry(id.to_string()).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Persist a new document and merge its tags into the catalog.
    ///
    /// A tag whose name matches a catalog entry case-insensitively reuses that
    /// entry's id; the document still records every tag it was given.
    pub fn add_document(
        &self,
        new: NewDocument,
        tags: Vec<Tag>,
    ) -> Result<ProcessedDocument, StoreError> {
        let _guard = self.lock();

        let previous_catalog = self.storage.get(Collection::DocumentTags.key())?;
        let mut catalog: Vec<Tag> = self.load(Collection::DocumentTags)?;
        let mut documents: Vec<ProcessedDocument> = self.load(Collection::Documents)?;
        let catalog_len = catalog.len();

        let mut doc_tags = Vec::with_capacity(tags.len());
        for tag in tags {
            let name = tag.name.trim().to_string();
            if name.is_empty() {
                warn!("Skipping tag with empty name");
                continue;
            }
            let key = name_key(&name);

            match catalog.iter().find(|t| t.name_key() == key) {
                Some(existing) => {
                    debug!("Tag '{}' already in catalog as {}", name, existing.id);
                    doc_tags.push(Tag {
                        id: existing.id.clone(),
                        name,
                        ..tag
                    });
                }
                None => {
                    let id = if catalog.iter().any(|t| t.id == tag.id) {
                        uuid::Uuid::new_v4().to_string()
                    } else {
                        tag.id
                    };
                    let entry = Tag { id, name, ..tag };
                    catalog.push(entry.clone());
                    doc_tags.push(entry);
                }
            }
        }

        let document = new.into_document(uuid::Uuid::new_v4().to_string(), doc_tags);
        documents.push(document.clone());

        let catalog_changed = catalog.len() != catalog_len;
        if catalog_changed {
            self.save(Collection::DocumentTags, &catalog)?;
        }
        if let Err(e) = self.save(Collection::Documents, &documents) {
            if catalog_changed {
                self.restore(Collection::DocumentTags, previous_catalog);
            }
            return Err(e);
        }

        if catalog_changed {
            self.notifier.publish(Collection::DocumentTags);
        }
        self.notifier.publish(Collection::Documents);

        info!(
            "Added document {} '{}' with {} tags ({} new in catalog)",
            document.id,
            document.title,
            document.tags.len(),
            catalog.len() - catalog_len
        );
        Ok(document)
    }

    /// Put back a collection's previous blob after a failed multi-step write.
    fn restore(&self, collection: Collection, previous: Option<String>) {
        let result = match previous {
            Some(raw) => self.storage.set(collection.key(), &raw),
            None => self.storage.remove(collection.key()),
        };
        if let Err(e) = result {
            error!("Failed to roll back {} after a failed write: {}", collection, e);
        }
    }

    /// Remove a document, then drop catalog tags no remaining document references.
    ///
    /// Returns `Ok(false)` if the id is unknown.
    pub fn delete_document(&self, id: &str) -> Result<bool, StoreError> {
        let _guard = self.lock();

        let mut documents: Vec<ProcessedDocument> = self.load(Collection::Documents)?;
        let before = documents.len();
        documents.retain(|d| d.id != id);
        if documents.len() == before {
            info!("Document {} not found, nothing to delete", id);
            return Ok(false);
        }

        let referenced: HashSet<&str> = documents
            .iter()
            .flat_map(|d| d.tags.iter().map(|t| t.id.as_str()))
            .collect();
        let mut catalog: Vec<Tag> = self.load(Collection::DocumentTags)?;
        let catalog_len = catalog.len();
        catalog.retain(|t| referenced.contains(t.id.as_str()));

        let removed = catalog_len - catalog.len();
        let previous_documents = self.storage.get(Collection::Documents.key())?;
        self.save(Collection::Documents, &documents)?;
        if removed > 0 {
            if let Err(e) = self.save(Collection::DocumentTags, &catalog) {
                self.restore(Collection::Documents, previous_documents);
                return Err(e);
            }
        }

        self.notifier.publish(Collection::Documents);
        if removed > 0 {
            self.notifier.publish(Collection::DocumentTags);
        }

        info!("Deleted document {} ({} orphaned tags removed)", id, removed);
        Ok(true)
    }

    /// Remove a catalog tag and strip it from every document.
    ///
    /// Returns `Ok(false)` if no catalog entry or document used the id.
    pub fn delete_tag(&self, id: &str) -> Result<bool, StoreError> {
        let _guard = self.lock();

        let mut documents: Vec<ProcessedDocument> = self.load(Collection::Documents)?;
        let mut stripped = 0;
        for doc in documents.iter_mut().filter(|d| d.references_tag(id)) {
            let before = doc.tags.len();
            doc.tags.retain(|t| t.id != id);
            stripped += before - doc.tags.len();
        }

        let mut catalog: Vec<Tag> = self.load(Collection::DocumentTags)?;
        let catalog_len = catalog.len();
        catalog.retain(|t| t.id != id);
        let in_catalog = catalog.len() != catalog_len;

        if !in_catalog && stripped == 0 {
            info!("Tag {} not found, nothing to delete", id);
            return Ok(false);
        }

        // Documents first so no document points at a missing catalog entry
        let previous_documents = self.storage.get(Collection::Documents.key())?;
        if stripped > 0 {
            self.save(Collection::Documents, &documents)?;
        }
        if in_catalog {
            if let Err(e) = self.save(Collection::DocumentTags, &catalog) {
                if stripped > 0 {
                    self.restore(Collection::Documents, previous_documents);
                }
                return Err(e);
            }
            self.notifier.publish(Collection::DocumentTags);
        }
        if stripped > 0 {
            self.notifier.publish(Collection::Documents);
        }

        info!("Deleted tag {} (removed from {} document tags)", id, stripped);
        Ok(true)
    }

    /// Rename a catalog tag and its copies on documents.
    ///
    /// The new name is not checked against other catalog entries; a collision
    /// is logged and allowed.
    pub fn edit_tag(&self, id: &str, new_name: &str) -> Result<bool, StoreError> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(StoreError::EmptyTagName);
        }

        let _guard = self.lock();

        let mut catalog: Vec<Tag> = self.load(Collection::DocumentTags)?;
        if !catalog.iter().any(|t| t.id == id) {
            info!("Tag {} not found, nothing to rename", id);
            return Ok(false);
        }
        if let Some(other) = catalog
            .iter()
            .find(|t| t.id != id && t.same_name(new_name))
        {
            warn!(
                "Renaming tag {} to '{}' duplicates catalog tag {}",
                id, new_name, other.id
            );
        }

        for tag in catalog.iter_mut().filter(|t| t.id == id) {
            tag.name = new_name.to_string();
        }

        let mut documents: Vec<ProcessedDocument> = self.load(Collection::Documents)?;
        let mut renamed = 0;
        for tag in documents
            .iter_mut()
            .flat_map(|d| d.tags.iter_mut())
            .filter(|t| t.id == id)
        {
            tag.name = new_name.to_string();
            renamed += 1;
        }

        let previous_catalog = self.storage.get(Collection::DocumentTags.key())?;
        self.save(Collection::DocumentTags, &catalog)?;
        if renamed > 0 {
            if let Err(e) = self.save(Collection::Documents, &documents) {
                self.restore(Collection::DocumentTags, previous_catalog);
                return Err(e);
            }
        }

        self.notifier.publish(Collection::DocumentTags);
        if renamed > 0 {
            self.notifier.publish(Collection::Documents);
        }

        info!("Renamed tag {} to '{}'", id, new_name);
        Ok(true)
    }

    /// Move a document to a new status.
    ///
    /// Returns `Ok(false)` for an unknown id or when the status is unchanged.
    pub fn set_status(&self, id: &str, status: DocumentStatus) -> Result<bool, StoreError> {
        let _guard = self.lock();

        let mut documents: Vec<ProcessedDocument> = self.load(Collection::Documents)?;
        let Some(doc) = documents.iter_mut().find(|d| d.id == id) else {
            info!("Document {} not found, status unchanged", id);
            return Ok(false);
        };

        if doc.status == status {
            return Ok(false);
        }
        if !doc.status.can_transition_to(status) {
            return Err(StoreError::InvalidTransition {
                id: id.to_string(),
                from: doc.status.as_str(),
                to: status.as_str(),
            });
        }
        doc.status = status;

        self.save(Collection::Documents, &documents)?;
        self.notifier.publish(Collection::Documents);
        info!("Document {} is now {}", id, status.as_str());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentType;
    use crate::notify::SignalOrigin;
    use crate::storage::{MemoryStorage, StorageEvent};

    fn store() -> DocumentStore {
        DocumentStore::open(Arc::new(MemoryStorage::new()), ChangeNotifier::new()).unwrap()
    }

    fn doc(title: &str) -> NewDocument {
        NewDocument::new(title, DocumentType::Text, "summary")
    }

    fn tag(name: &str) -> Tag {
        Tag::new(name, 0.8, TagCategory::Keyword)
    }

    #[test]
    fn test_add_document_assigns_id_and_catalogs_tags() {
        let store = store();
        let added = store
            .add_document(doc("a.txt"), vec![tag("财务"), tag("报告")])
            .unwrap();

        assert!(!added.id.is_empty());
        assert_eq!(store.documents().unwrap(), vec![added.clone()]);

        let catalog = store.tags().unwrap();
        assert_eq!(catalog.len(), 2);
        for t in &added.tags {
            assert!(catalog.iter().any(|c| c.id == t.id));
        }
    }

    #[test]
    fn test_duplicate_in_same_batch() {
        let store = store();
        let added = store
            .add_document(doc("a.txt"), vec![tag("Plan"), tag("plan ")])
            .unwrap();

        assert_eq!(store.tags().unwrap().len(), 1);
        assert_eq!(added.tags.len(), 2);
        assert_eq!(added.tags[0].id, added.tags[1].id);
    }

    #[test]
    fn test_blank_tags_skipped() {
        let store = store();
        let added = store.add_document(doc("a.txt"), vec![tag("  ")]).unwrap();
        assert!(added.tags.is_empty());
        assert!(store.tags().unwrap().is_empty());
    }

    #[test]
    fn test_open_resets_corrupt_blob() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set("documents", "{not json").unwrap();
        storage.set("documentTags", "[]").unwrap();

        let store = DocumentStore::open(storage.clone(), ChangeNotifier::new()).unwrap();
        assert!(store.documents().unwrap().is_empty());
        assert_eq!(storage.get("documents").unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn test_corrupt_blob_written_later_reads_empty() {
        let storage = Arc::new(MemoryStorage::new());
        let store = DocumentStore::open(storage.clone(), ChangeNotifier::new()).unwrap();
        storage.set("documentTags", "garbage").unwrap();
        assert!(store.tags().unwrap().is_empty());

        // Next write replaces it with a well-formed collection
        store.add_document(doc("a.txt"), vec![tag("x")]).unwrap();
        assert_eq!(store.tags().unwrap().len(), 1);
    }

    #[test]
    fn test_set_status_transitions() {
        let store = store();
        let added = store
            .add_document(doc("a.txt").with_status(DocumentStatus::Processing), vec![])
            .unwrap();

        assert!(store.set_status(&added.id, DocumentStatus::Error).unwrap());
        assert!(store.set_status(&added.id, DocumentStatus::Processing).unwrap());
        assert!(store.set_status(&added.id, DocumentStatus::Processed).unwrap());
        assert!(!store.set_status(&added.id, DocumentStatus::Processed).unwrap());

        let err = store
            .set_status(&added.id, DocumentStatus::Processing)
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));
        assert!(!store.set_status("missing", DocumentStatus::Error).unwrap());
    }

    #[test]
    fn test_mutations_publish_signals() {
        let store = store();
        let mut sub = store.notifier().subscribe_all();

        let added = store.add_document(doc("a.txt"), vec![tag("x")]).unwrap();
        let first = sub.try_recv().unwrap();
        let second = sub.try_recv().unwrap();
        assert_eq!(first.collection, Collection::DocumentTags);
        assert_eq!(second.collection, Collection::Documents);
        assert_eq!(second.origin, SignalOrigin::Local);
        assert!(second.seq > first.seq);

        // Unknown id: no signal
        store.delete_document("missing").unwrap();
        assert!(sub.try_recv().is_none());

        store.delete_document(&added.id).unwrap();
        let collections: Vec<Collection> =
            std::iter::from_fn(|| sub.try_recv()).map(|s| s.collection).collect();
        assert_eq!(
            collections,
            vec![Collection::Documents, Collection::DocumentTags]
        );
    }

    #[test]
    fn test_search_and_filters() {
        let store = store();
        store
            .add_document(
                NewDocument::new("Q3 budget.txt", DocumentType::Text, "Finance numbers"),
                vec![Tag::new("2023年", 0.9, TagCategory::Entity)],
            )
            .unwrap();
        store
            .add_document(
                NewDocument::new("kickoff.pdf", DocumentType::Pdf, "Project kickoff"),
                vec![Tag::new("会议", 0.8, TagCategory::Keyword)],
            )
            .unwrap();

        assert_eq!(store.search("BUDGET").unwrap().len(), 1);
        assert_eq!(store.search("会议").unwrap().len(), 1);
        assert_eq!(store.search("").unwrap().len(), 2);
        assert_eq!(store.tags_by_category(TagCategory::Entity).unwrap().len(), 1);
        assert!(store.tags_by_category(TagCategory::Theme).unwrap().is_empty());
    }

    #[test]
    fn test_usage_counts() {
        let store = store();
        let a = store.add_document(doc("a"), vec![tag("x"), tag("y")]).unwrap();
        store.add_document(doc("b"), vec![tag("X")]).unwrap();

        let counts = store.usage_counts().unwrap();
        assert_eq!(counts[&a.tags[0].id], 2);
        assert_eq!(counts[&a.tags[1].id], 1);
    }

    #[test]
    fn test_quota_failure_leaves_state_consistent() {
        let storage = Arc::new(MemoryStorage::with_quota(600));
        let store = DocumentStore::open(storage, ChangeNotifier::new()).unwrap();

        let mut failures = 0;
        for i in 0..20 {
            let title = format!("document-{}-{}", i, "x".repeat(40));
            if store
                .add_document(doc(&title), vec![tag(&format!("tag{}", i))])
                .is_err()
            {
                failures += 1;
            }
        }
        assert!(failures > 0);

        // Every document tag still resolves in the catalog
        let catalog = store.tags().unwrap();
        for d in store.documents().unwrap() {
            for t in d.tags {
                assert!(catalog.iter().any(|c| c.id == t.id));
            }
        }
    }

    /// Copy a populated store's blobs into quota-limited storage with `headroom` spare bytes.
    fn tight_copy(source: &MemoryStorage, headroom: usize) -> Arc<MemoryStorage> {
        let blobs: Vec<(&str, String)> = Collection::ALL
            .iter()
            .filter_map(|c| source.get(c.key()).unwrap().map(|v| (c.key(), v)))
            .collect();
        let total: usize = blobs.iter().map(|(k, v)| k.len() + v.len()).sum();

        let tight = Arc::new(MemoryStorage::with_quota(total + headroom));
        for (key, value) in &blobs {
            tight.set(key, value).unwrap();
        }
        tight
    }

    #[test]
    fn test_failed_rename_rolls_back_catalog() {
        let storage = Arc::new(MemoryStorage::new());
        let store = DocumentStore::open(storage.clone(), ChangeNotifier::new()).unwrap();
        for i in 0..10 {
            store
                .add_document(doc(&format!("doc-{}.txt", i)), vec![tag("alpha")])
                .unwrap();
        }
        let tag_id = store.tags().unwrap()[0].id.clone();

        let tight = tight_copy(&storage, 250);
        let store = DocumentStore::open(tight, ChangeNotifier::new()).unwrap();
        let mut sub = store.notifier().subscribe_all();

        let err = store.edit_tag(&tag_id, &"x".repeat(50)).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Storage(StorageError::QuotaExceeded { .. })
        ));

        assert_eq!(store.tags().unwrap()[0].name, "alpha");
        for d in store.documents().unwrap() {
            assert_eq!(d.tags[0].name, "alpha");
        }
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn test_failed_cascade_rolls_back_documents() {
        let storage = Arc::new(MemoryStorage::new());
        let store = DocumentStore::open(storage.clone(), ChangeNotifier::new()).unwrap();
        let keep = store.add_document(doc("keep.txt"), vec![tag("shared")]).unwrap();
        let gone = store
            .add_document(doc("gone.txt"), vec![tag("shared"), tag("only-here")])
            .unwrap();

        // Catalog key is unwritable, so the cascade step fails after documents were saved
        let failing = Arc::new(FailingKey {
            inner: MemoryStorage::new(),
            key: Collection::DocumentTags.key(),
        });
        for c in Collection::ALL {
            if let Some(raw) = storage.get(c.key()).unwrap() {
                failing.inner.set(c.key(), &raw).unwrap();
            }
        }
        let store = DocumentStore::open(failing, ChangeNotifier::new()).unwrap();

        assert!(store.delete_document(&gone.id).is_err());
        let ids: Vec<String> = store.documents().unwrap().into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![keep.id.clone(), gone.id.clone()]);
        assert_eq!(store.tags().unwrap().len(), 2);

        assert!(store.delete_tag(&gone.tags[1].id).is_err());
        assert_eq!(store.get_document(&gone.id).unwrap().unwrap().tags.len(), 2);
    }

    /// Storage whose writes to one key always fail.
    struct FailingKey {
        inner: MemoryStorage,
        key: &'static str,
    }

    impl KeyValueStore for FailingKey {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            if key == self.key {
                return Err(StorageError::Io {
                    key: key.to_string(),
                    source: std::io::Error::other("read-only"),
                });
            }
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), StorageError> {
            self.inner.remove(key)
        }

        fn watch(&self) -> Option<tokio::sync::broadcast::Receiver<StorageEvent>> {
            None
        }
    }
}
