//! Shared utility functions.
//!
//! - `mime`: media type guessing, the upload gate and filename sanitizing

pub mod mime;

pub use mime::{document_type_for_mime, resolve_mime, sanitize_filename};
