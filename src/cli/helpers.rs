//! Shared helper functions for CLI commands.

use std::sync::Arc;

use doctag::config::Settings;
use doctag::models::{ProcessedDocument, Tag};
use doctag::notify::ChangeNotifier;
use doctag::storage::FileStorage;
use doctag::store::DocumentStore;

/// Open the document store under the configured data directory.
pub fn open_store(settings: &Settings) -> anyhow::Result<Arc<DocumentStore>> {
    let storage = FileStorage::open(settings.state_dir())?.with_poll_interval(settings.poll_interval);
    let store = DocumentStore::open(Arc::new(storage), ChangeNotifier::new())?;
    Ok(Arc::new(store))
}

/// Truncate a string to at most `max_chars` characters, marking the cut.
pub fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Comma-separated tag names.
pub fn tag_names(tags: &[Tag]) -> String {
    tags.iter()
        .map(|t| t.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// One table row for a document.
pub fn document_row(doc: &ProcessedDocument) -> String {
    format!(
        "{:<36} {:<24} {:<10} {}",
        doc.id,
        truncate(&doc.title, 23),
        doc.status.as_str(),
        truncate(&tag_names(&doc.tags), 40)
    )
}
