//! Plain text extraction.

use async_trait::async_trait;

use super::{Artifact, ContentExtractor, ExtractError, ExtractionMethod, ExtractionResult};
use crate::utils::mime::is_plain_text;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Reads the whole artifact and decodes it as UTF-8.
pub struct PlainTextExtractor;

#[async_trait]
impl ContentExtractor for PlainTextExtractor {
    fn name(&self) -> &'static str {
        "plain-text"
    }

    fn supports(&self, media_type: &str) -> bool {
        is_plain_text(media_type)
    }

    async fn extract(&self, artifact: &Artifact) -> Result<ExtractionResult, ExtractError> {
        let bytes = artifact.read_bytes().await?;
        let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(&bytes);

        let text = std::str::from_utf8(body).map_err(|e| ExtractError::Decode {
            name: artifact.name.clone(),
            reason: e.to_string(),
        })?;

        Ok(ExtractionResult {
            text: text.to_string(),
            method: ExtractionMethod::DirectRead,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_strips_bom() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice("meeting notes".as_bytes());
        let artifact = Artifact::from_bytes("notes.txt", "text/plain", bytes);

        let result = PlainTextExtractor.extract(&artifact).await.unwrap();
        assert_eq!(result.text, "meeting notes");
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_decode_error() {
        let artifact = Artifact::from_bytes("bad.txt", "text/plain", vec![0x66, 0xff, 0xfe]);

        let err = PlainTextExtractor.extract(&artifact).await.unwrap_err();
        assert!(matches!(err, ExtractError::Decode { .. }));
        assert!(err.is_read_error());
    }

    #[tokio::test]
    async fn test_empty_file_is_empty_text() {
        let artifact = Artifact::from_bytes("empty.txt", "text/plain", Vec::new());
        let result = PlainTextExtractor.extract(&artifact).await.unwrap();
        assert!(result.text.is_empty());
    }
}
