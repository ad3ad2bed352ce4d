//! Catalog and cascade behavior of the document store.

use std::collections::HashSet;
use std::sync::Arc;

use doctag::models::{DocumentType, NewDocument, Tag, TagCategory};
use doctag::notify::ChangeNotifier;
use doctag::storage::MemoryStorage;
use doctag::store::{DocumentStore, StoreError};

fn store() -> DocumentStore {
    DocumentStore::open(Arc::new(MemoryStorage::new()), ChangeNotifier::new()).unwrap()
}

fn doc(title: &str) -> NewDocument {
    NewDocument::new(title, DocumentType::Text, "summary")
}

fn tag(name: &str) -> Tag {
    Tag::new(name, 0.8, TagCategory::Theme)
}

/// Every catalog tag is referenced by at least one document.
fn assert_no_orphans(store: &DocumentStore) {
    let referenced: HashSet<String> = store
        .documents()
        .unwrap()
        .iter()
        .flat_map(|d| d.tags.iter().map(|t| t.id.clone()))
        .collect();
    for tag in store.tags().unwrap() {
        assert!(referenced.contains(&tag.id), "orphaned tag {}", tag.name);
    }
}

#[test]
fn case_variants_share_one_catalog_entry() {
    let store = store();
    let first = store.add_document(doc("a.txt"), vec![tag("Finance")]).unwrap();
    let second = store.add_document(doc("b.txt"), vec![tag("finance")]).unwrap();

    let catalog = store.tags().unwrap();
    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog[0].name, "Finance");
    assert_eq!(first.tags[0].id, second.tags[0].id);
    // The document keeps the spelling it was given
    assert_eq!(second.tags[0].name, "finance");
}

#[test]
fn duplicate_names_within_one_upload_collapse() {
    let store = store();
    let document = store
        .add_document(doc("a.txt"), vec![tag("报告"), tag("报告 "), tag(" ")])
        .unwrap();

    assert_eq!(store.tags().unwrap().len(), 1);
    assert_eq!(document.tags.len(), 2);
    assert!(document.tags.iter().all(|t| t.name == "报告"));
}

#[test]
fn deleting_only_reference_removes_tag() {
    let store = store();
    let only = store.add_document(doc("x.txt"), vec![tag("X")]).unwrap();
    let first_y = store.add_document(doc("y1.txt"), vec![tag("Y")]).unwrap();
    store.add_document(doc("y2.txt"), vec![tag("Y")]).unwrap();

    assert!(store.delete_document(&only.id).unwrap());
    let names: Vec<String> = store.tags().unwrap().into_iter().map(|t| t.name).collect();
    assert_eq!(names, vec!["Y".to_string()]);

    assert!(store.delete_document(&first_y.id).unwrap());
    assert_eq!(store.tags().unwrap().len(), 1);
    assert_no_orphans(&store);
}

#[test]
fn cascade_holds_across_mixed_operations() {
    let store = store();
    let a = store
        .add_document(doc("a.txt"), vec![tag("财务"), tag("报告")])
        .unwrap();
    let b = store
        .add_document(doc("b.txt"), vec![tag("报告"), tag("计划")])
        .unwrap();
    let c = store.add_document(doc("c.txt"), vec![tag("会议")]).unwrap();

    for id in [&b.id, &a.id, &c.id] {
        store.delete_document(id).unwrap();
        assert_no_orphans(&store);
    }
    assert!(store.documents().unwrap().is_empty());
    assert!(store.tags().unwrap().is_empty());
}

#[test]
fn delete_is_idempotent() {
    let store = store();
    let document = store.add_document(doc("a.txt"), vec![tag("x")]).unwrap();
    store.add_document(doc("b.txt"), vec![tag("y")]).unwrap();

    assert!(store.delete_document(&document.id).unwrap());
    let documents = store.documents().unwrap();
    let tags = store.tags().unwrap();

    assert!(!store.delete_document(&document.id).unwrap());
    assert!(!store.delete_document("never-existed").unwrap());
    assert_eq!(store.documents().unwrap(), documents);
    assert_eq!(store.tags().unwrap(), tags);
    assert_eq!(documents.len(), 1);
}

#[test]
fn delete_tag_strips_documents() {
    let store = store();
    let document = store
        .add_document(doc("a.txt"), vec![tag("keep"), tag("drop")])
        .unwrap();
    let drop_id = document.tags[1].id.clone();

    assert!(store.delete_tag(&drop_id).unwrap());
    let stored = store.get_document(&document.id).unwrap().unwrap();
    assert_eq!(stored.tags.len(), 1);
    assert_eq!(stored.tags[0].name, "keep");
    assert!(store.get_tag(&drop_id).unwrap().is_none());
    assert!(!store.delete_tag(&drop_id).unwrap());
}

#[test]
fn rename_collision_is_allowed() {
    let store = store();
    let document = store
        .add_document(doc("a.txt"), vec![tag("alpha"), tag("beta")])
        .unwrap();
    let beta = document.tags[1].id.clone();

    assert!(store.edit_tag(&beta, "Alpha").unwrap());
    let names: Vec<String> = store.tags().unwrap().into_iter().map(|t| t.name).collect();
    assert_eq!(names, vec!["alpha".to_string(), "Alpha".to_string()]);

    let stored = store.get_document(&document.id).unwrap().unwrap();
    assert_eq!(stored.tags[1].name, "Alpha");

    assert!(matches!(
        store.edit_tag(&beta, "   "),
        Err(StoreError::EmptyTagName)
    ));
    assert!(!store.edit_tag("missing", "x").unwrap());
}

#[test]
fn search_and_category_filters() {
    let store = store();
    store
        .add_document(
            NewDocument::new("年度财务报告.txt", DocumentType::Text, "annual numbers"),
            vec![Tag::new("2023年", 0.9, TagCategory::Entity), tag("财务")],
        )
        .unwrap();
    store
        .add_document(doc("meeting.txt"), vec![Tag::new("会议", 0.8, TagCategory::Keyword)])
        .unwrap();

    assert_eq!(store.search("财务").unwrap().len(), 1);
    assert_eq!(store.search("ANNUAL").unwrap().len(), 1);
    assert_eq!(store.search("").unwrap().len(), 2);
    assert_eq!(store.tags_by_category(TagCategory::Entity).unwrap().len(), 1);
    assert_eq!(store.tags_by_category(TagCategory::Theme).unwrap().len(), 1);

    let counts = store.usage_counts().unwrap();
    assert!(counts.values().all(|count| *count == 1));
}
