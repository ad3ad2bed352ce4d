//! Content extraction for uploaded artifacts.
//!
//! Plain text is read and decoded. Binary formats (PDF, Word, images) get a
//! placeholder derived from the filename; a real parser can be registered in
//! front of the placeholder without changing what callers receive.

mod placeholder;
mod plain;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::utils::mime::{is_supported_upload, resolve_mime};

pub use placeholder::PlaceholderExtractor;
pub use plain::PlainTextExtractor;

/// Bytes sniffed from the start of a file when its type is not declared.
const SNIFF_LEN: usize = 8192;

/// Errors that can occur during content extraction.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Failed to read {name}: {source}")]
    Read {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode {name} as text: {reason}")]
    Decode { name: String, reason: String },

    #[error("Unsupported media type '{media_type}' for {name}")]
    Unsupported { name: String, media_type: String },
}

impl ExtractError {
    /// Whether the artifact itself could not be read or decoded.
    pub fn is_read_error(&self) -> bool {
        matches!(self, Self::Read { .. } | Self::Decode { .. })
    }
}

/// Where an artifact's bytes live.
#[derive(Debug, Clone)]
pub enum ArtifactSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

/// A user-supplied file together with its declared media type.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub name: String,
    pub media_type: String,
    pub source: ArtifactSource,
}

impl Artifact {
    pub fn from_bytes(
        name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            source: ArtifactSource::Bytes(bytes.into()),
        }
    }

    /// Build an artifact for a file on disk.
    ///
    /// The media type is the declared one when given, otherwise it is guessed
    /// from the extension and then from the first bytes of the file.
    pub async fn from_path(path: &Path, declared: Option<&str>) -> Result<Self, ExtractError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        let head = if declared.is_some() {
            Vec::new()
        } else {
            read_head(path).await.map_err(|source| ExtractError::Read {
                name: name.clone(),
                source,
            })?
        };

        Ok(Self {
            media_type: resolve_mime(declared, &name, &head),
            name,
            source: ArtifactSource::Path(path.to_path_buf()),
        })
    }

    /// Read the full content. Suspends until the read completes.
    pub async fn read_bytes(&self) -> Result<Vec<u8>, ExtractError> {
        match &self.source {
            ArtifactSource::Bytes(bytes) => Ok(bytes.clone()),
            ArtifactSource::Path(path) => {
                tokio::fs::read(path)
                    .await
                    .map_err(|source| ExtractError::Read {
                        name: self.name.clone(),
                        source,
                    })
            }
        }
    }
}

async fn read_head(path: &Path) -> std::io::Result<Vec<u8>> {
    use tokio::io::AsyncReadExt;

    let file = tokio::fs::File::open(path).await?;
    let mut head = Vec::with_capacity(SNIFF_LEN);
    file.take(SNIFF_LEN as u64).read_to_end(&mut head).await?;
    Ok(head)
}

/// Method used to obtain the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMethod {
    /// Content was read and decoded as text.
    DirectRead,
    /// Non-semantic stand-in derived from the artifact name.
    Placeholder,
    /// A registered parser produced the text.
    Parsed,
}

/// Result of content extraction.
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    pub text: String,
    pub method: ExtractionMethod,
}

/// Turns an artifact into text.
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Whether this extractor handles the (normalized) media type.
    fn supports(&self, media_type: &str) -> bool;

    async fn extract(&self, artifact: &Artifact) -> Result<ExtractionResult, ExtractError>;
}

/// Dispatches an artifact to the first extractor that supports its media type.
pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn ContentExtractor>>,
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self {
            extractors: vec![
                Box::new(PlainTextExtractor),
                Box::new(PlaceholderExtractor),
            ],
        }
    }
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an extractor ahead of the built-in ones.
    pub fn with_extractor(mut self, extractor: impl ContentExtractor + 'static) -> Self {
        self.extractors.insert(0, Box::new(extractor));
        self
    }

    /// Extract text from an artifact of a supported upload type.
    pub async fn extract(&self, artifact: &Artifact) -> Result<ExtractionResult, ExtractError> {
        let media_type = crate::utils::mime::normalize_mime(&artifact.media_type);
        let unsupported = || ExtractError::Unsupported {
            name: artifact.name.clone(),
            media_type: media_type.clone(),
        };

        if !is_supported_upload(&media_type) {
            return Err(unsupported());
        }

        let extractor = self
            .extractors
            .iter()
            .find(|e| e.supports(&media_type))
            .ok_or_else(unsupported)?;

        debug!(
            "Extracting {} ({}) with {}",
            artifact.name,
            media_type,
            extractor.name()
        );
        extractor.extract(artifact).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct UppercaseExtractor;

    #[async_trait]
    impl ContentExtractor for UppercaseExtractor {
        fn name(&self) -> &'static str {
            "uppercase"
        }

        fn supports(&self, media_type: &str) -> bool {
            media_type == "application/pdf"
        }

        async fn extract(&self, artifact: &Artifact) -> Result<ExtractionResult, ExtractError> {
            Ok(ExtractionResult {
                text: artifact.name.to_uppercase(),
                method: ExtractionMethod::Parsed,
            })
        }
    }

    #[tokio::test]
    async fn test_plain_text_is_read() {
        let artifact = Artifact::from_bytes("a.txt", "text/plain", "2023年度财务报告".as_bytes());
        let result = ExtractorRegistry::new().extract(&artifact).await.unwrap();
        assert_eq!(result.text, "2023年度财务报告");
        assert_eq!(result.method, ExtractionMethod::DirectRead);
    }

    #[tokio::test]
    async fn test_pdf_gets_placeholder() {
        let artifact = Artifact::from_bytes("plan.pdf", "application/pdf", vec![0x25, 0x50]);
        let result = ExtractorRegistry::new().extract(&artifact).await.unwrap();
        assert_eq!(result.method, ExtractionMethod::Placeholder);
        assert!(result.text.contains("plan.pdf"));
    }

    #[tokio::test]
    async fn test_registered_parser_wins_over_placeholder() {
        let registry = ExtractorRegistry::new().with_extractor(UppercaseExtractor);
        let artifact = Artifact::from_bytes("plan.pdf", "application/pdf", vec![]);
        let result = registry.extract(&artifact).await.unwrap();
        assert_eq!(result.text, "PLAN.PDF");
        assert_eq!(result.method, ExtractionMethod::Parsed);
    }

    #[tokio::test]
    async fn test_unsupported_media_type() {
        let artifact = Artifact::from_bytes("page.html", "text/html", "<p>x</p>".as_bytes());
        let err = ExtractorRegistry::new().extract(&artifact).await.unwrap_err();
        assert!(matches!(err, ExtractError::Unsupported { .. }));
        assert!(!err.is_read_error());
    }

    #[tokio::test]
    async fn test_missing_file_is_read_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("gone.txt");
        let artifact = Artifact::from_path(&path, Some("text/plain")).await.unwrap();
        let err = ExtractorRegistry::new().extract(&artifact).await.unwrap_err();
        assert!(err.is_read_error());
    }

    #[tokio::test]
    async fn test_from_path_guesses_media_type() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("minutes");
        std::fs::write(&path, "项目会议纪要").unwrap();

        let artifact = Artifact::from_path(&path, None).await.unwrap();
        assert_eq!(artifact.name, "minutes");
        assert_eq!(artifact.media_type, "text/plain");
    }
}
