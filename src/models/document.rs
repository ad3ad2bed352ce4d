//! Processed document model.
//!
//! Serialized with camelCase field names so the persisted `documents`
//! collection keeps the shape other contexts already read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::tag::Tag;

/// Coarse artifact kind used for display and for choosing how to open it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Pdf,
    Text,
    Image,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Text => "text",
            Self::Image => "image",
        }
    }

    /// Whether a browser can usually preview this type inline.
    pub fn is_previewable(&self) -> bool {
        matches!(self, Self::Pdf | Self::Image)
    }
}

/// Processing status of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Processing,
    Processed,
    Error,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Processed => "processed",
            Self::Error => "error",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "processing" => Some(Self::Processing),
            "processed" => Some(Self::Processed),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Allowed moves: processing -> processed | error, error -> processing.
    pub fn can_transition_to(&self, next: DocumentStatus) -> bool {
        matches!(
            (self, next),
            (Self::Processing, Self::Processed)
                | (Self::Processing, Self::Error)
                | (Self::Error, Self::Processing)
        )
    }
}

/// A document that went through the upload pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedDocument {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    pub uploaded_at: DateTime<Utc>,
    pub status: DocumentStatus,
    pub summary: String,
    pub tags: Vec<Tag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

impl ProcessedDocument {
    /// Whether any of this document's tags reference the given catalog id.
    pub fn references_tag(&self, tag_id: &str) -> bool {
        self.tags.iter().any(|t| t.id == tag_id)
    }

    /// Case-insensitive match against title, summary and tag names.
    pub fn matches_query(&self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.title.to_lowercase().contains(&needle)
            || self.summary.to_lowercase().contains(&needle)
            || self
                .tags
                .iter()
                .any(|t| t.name.to_lowercase().contains(&needle))
    }
}

/// Caller-supplied fields of a document; the store assigns `id`.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub title: String,
    pub doc_type: DocumentType,
    pub status: DocumentStatus,
    pub summary: String,
    pub file_path: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

impl NewDocument {
    pub fn new(title: impl Into<String>, doc_type: DocumentType, summary: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            doc_type,
            status: DocumentStatus::Processed,
            summary: summary.into(),
            file_path: None,
            uploaded_at: Utc::now(),
        }
    }

    pub fn with_status(mut self, status: DocumentStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_file_path(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = Some(file_path.into());
        self
    }

    pub(crate) fn into_document(self, id: String, tags: Vec<Tag>) -> ProcessedDocument {
        ProcessedDocument {
            id,
            title: self.title,
            doc_type: self.doc_type,
            uploaded_at: self.uploaded_at,
            status: self.status,
            summary: self.summary,
            tags,
            file_path: self.file_path,
        }
    }
}
