//! Filename-derived stand-in text for formats that are not parsed.

use async_trait::async_trait;

use super::{Artifact, ContentExtractor, ExtractError, ExtractionMethod, ExtractionResult};
use crate::utils::mime::{is_word_document, normalize_mime};

/// Returns a non-semantic placeholder for PDF, Word and image artifacts.
///
/// The artifact content is not read.
pub struct PlaceholderExtractor;

impl PlaceholderExtractor {
    fn kind_label(media_type: &str) -> &'static str {
        let media_type = normalize_mime(media_type);
        if media_type == "application/pdf" {
            "PDF document"
        } else if is_word_document(&media_type) {
            "Word document"
        } else {
            "Image"
        }
    }
}

#[async_trait]
impl ContentExtractor for PlaceholderExtractor {
    fn name(&self) -> &'static str {
        "placeholder"
    }

    fn supports(&self, media_type: &str) -> bool {
        let media_type = normalize_mime(media_type);
        media_type == "application/pdf"
            || media_type.starts_with("image/")
            || is_word_document(&media_type)
    }

    async fn extract(&self, artifact: &Artifact) -> Result<ExtractionResult, ExtractError> {
        Ok(ExtractionResult {
            text: format!("{}: {}", Self::kind_label(&artifact.media_type), artifact.name),
            method: ExtractionMethod::Placeholder,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_placeholder_keeps_filename_keywords() {
        let artifact = Artifact::from_bytes("2023年度财务报告.docx", "application/msword", vec![]);
        let result = PlaceholderExtractor.extract(&artifact).await.unwrap();
        assert_eq!(result.text, "Word document: 2023年度财务报告.docx");
    }

    #[test]
    fn test_supports() {
        assert!(PlaceholderExtractor.supports("image/png"));
        assert!(PlaceholderExtractor.supports("application/pdf"));
        assert!(!PlaceholderExtractor.supports("text/plain"));
    }
}
