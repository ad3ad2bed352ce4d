//! Domain models for processed documents and tags.

// Model types use `from_str` methods that return Option<Self>,
// not Result<Self, Error> as std::str::FromStr requires.
#![allow(clippy::should_implement_trait)]

mod document;
mod tag;

pub use document::{DocumentStatus, DocumentType, NewDocument, ProcessedDocument};
pub use tag::{name_key, Tag, TagCategory};
