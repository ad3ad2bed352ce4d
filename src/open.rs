//! Re-opening an archived original: inline preview or download.

use thiserror::Error;
use url::Url;

use crate::models::ProcessedDocument;

#[derive(Debug, Error)]
pub enum OpenError {
    #[error("Document '{title}' has no stored file")]
    MissingFilePath { title: String },

    #[error("Invalid URL for '{path}': {source}")]
    InvalidUrl {
        path: String,
        #[source]
        source: url::ParseError,
    },
}

/// What to do with a document's original.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenAction {
    /// Show in place (PDF and images).
    Inline(Url),
    /// Save under `filename`.
    Download { url: Url, filename: String },
}

impl OpenAction {
    pub fn url(&self) -> &Url {
        match self {
            Self::Inline(url) => url,
            Self::Download { url, .. } => url,
        }
    }
}

/// Resolve a document's `filePath` against `base_url`.
///
/// The path is taken relative to the base, so a base ending in `/` keeps its
/// own path prefix (`file:///data/doctag/` + `/files/a.pdf`).
pub fn resolve_open_action(
    doc: &ProcessedDocument,
    base_url: &Url,
) -> Result<OpenAction, OpenError> {
    let path = doc
        .file_path
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| OpenError::MissingFilePath {
            title: doc.title.clone(),
        })?;

    let url = base_url
        .join(path.trim_start_matches('/'))
        .map_err(|source| OpenError::InvalidUrl {
            path: path.to_string(),
            source,
        })?;

    if doc.doc_type.is_previewable() {
        Ok(OpenAction::Inline(url))
    } else {
        Ok(OpenAction::Download {
            url,
            filename: doc.title.clone(),
        })
    }
}
