//! Media type guessing and classification for uploaded artifacts.

use crate::models::DocumentType;

/// Media type used when nothing better is known.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Word processing formats accepted by the upload gate.
const WORD_MIME_TYPES: &[&str] = &[
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

/// Guess a media type from a filename's extension.
pub fn guess_mime_from_filename(name: &str) -> &'static str {
    let Some((_, ext)) = name.rsplit_once('.') else {
        return OCTET_STREAM;
    };

    match ext.to_lowercase().as_str() {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "txt" | "text" | "log" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "json" => "application/json",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "tif" | "tiff" => "image/tiff",
        "bmp" => "image/bmp",
        "zip" => "application/zip",
        _ => OCTET_STREAM,
    }
}

/// Sniff a media type from leading content bytes.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    infer::get(bytes).map(|kind| kind.mime_type())
}

/// Resolve the media type for an artifact: declared > extension > content sniffing.
pub fn resolve_mime(declared: Option<&str>, filename: &str, head: &[u8]) -> String {
    if let Some(declared) = declared.map(str::trim).filter(|m| !m.is_empty()) {
        return normalize_mime(declared);
    }
    let guessed = guess_mime_from_filename(filename);
    if guessed != OCTET_STREAM {
        return guessed.to_string();
    }
    match sniff_mime(head) {
        Some(sniffed) => sniffed.to_string(),
        None if !head.is_empty() && std::str::from_utf8(head).is_ok() => "text/plain".to_string(),
        None => OCTET_STREAM.to_string(),
    }
}

/// Lowercase a media type and drop parameters (`text/plain; charset=utf-8` -> `text/plain`).
pub fn normalize_mime(mime: &str) -> String {
    mime.split(';')
        .next()
        .unwrap_or(mime)
        .trim()
        .to_lowercase()
}

pub fn is_plain_text(mime: &str) -> bool {
    normalize_mime(mime) == "text/plain"
}

pub fn is_word_document(mime: &str) -> bool {
    WORD_MIME_TYPES.contains(&normalize_mime(mime).as_str())
}

/// Whether the upload gate accepts this media type (PDF, images, plain text, Word).
pub fn is_supported_upload(mime: &str) -> bool {
    let mime = normalize_mime(mime);
    mime == "application/pdf"
        || mime == "text/plain"
        || mime.starts_with("image/")
        || WORD_MIME_TYPES.contains(&mime.as_str())
}

/// Map a media type to the document kind recorded on the processed document.
pub fn document_type_for_mime(mime: &str) -> DocumentType {
    let mime = normalize_mime(mime);
    if mime == "application/pdf" {
        DocumentType::Pdf
    } else if mime.starts_with("image/") {
        DocumentType::Image
    } else {
        DocumentType::Text
    }
}

/// Make a display name safe to use as a single path component.
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    // Trim and limit length (by chars, names are often not ASCII)
    let trimmed = sanitized.trim().trim_matches('_').trim_start_matches('.');
    if trimmed.is_empty() {
        "document".to_string()
    } else {
        trimmed.chars().take(100).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guess_mime_from_filename() {
        assert_eq!(guess_mime_from_filename("report.PDF"), "application/pdf");
        assert_eq!(guess_mime_from_filename("notes.txt"), "text/plain");
        assert_eq!(guess_mime_from_filename("scan.jpeg"), "image/jpeg");
        assert_eq!(guess_mime_from_filename("README"), OCTET_STREAM);
        assert_eq!(guess_mime_from_filename("archive.tar.zst"), OCTET_STREAM);
    }

    #[test]
    fn test_resolve_mime_prefers_declared() {
        assert_eq!(
            resolve_mime(Some("Text/Plain; charset=UTF-8"), "x.pdf", b""),
            "text/plain"
        );
        assert_eq!(resolve_mime(None, "x.pdf", b""), "application/pdf");
        assert_eq!(resolve_mime(Some("  "), "x.png", b""), "image/png");
    }

    #[test]
    fn test_resolve_mime_sniffs_unknown_extension() {
        let png_header = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        assert_eq!(resolve_mime(None, "upload", &png_header), "image/png");
        assert_eq!(resolve_mime(None, "upload", "会议纪要".as_bytes()), "text/plain");
        assert_eq!(resolve_mime(None, "upload", &[0x00, 0x9f, 0x92, 0x96]), OCTET_STREAM);
    }

    #[test]
    fn test_supported_upload_gate() {
        assert!(is_supported_upload("application/pdf"));
        assert!(is_supported_upload("image/webp"));
        assert!(is_supported_upload("text/plain"));
        assert!(is_supported_upload("application/msword"));
        assert!(!is_supported_upload("text/html"));
        assert!(!is_supported_upload("application/zip"));
    }

    #[test]
    fn test_document_type_for_mime() {
        assert_eq!(document_type_for_mime("application/pdf"), DocumentType::Pdf);
        assert_eq!(document_type_for_mime("image/png"), DocumentType::Image);
        assert_eq!(document_type_for_mime("text/plain"), DocumentType::Text);
        assert_eq!(document_type_for_mime("application/msword"), DocumentType::Text);
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("a/b:c?.txt"), "a_b_c_.txt");
        assert_eq!(sanitize_filename("../../etc/passwd"), "_.._etc_passwd");
        assert_eq!(sanitize_filename("   "), "document");
        assert_eq!(sanitize_filename("财务报告.txt"), "财务报告.txt");
        assert_eq!(sanitize_filename(&"x".repeat(300)).len(), 100);
    }
}
