//! Tag model shared by the generator, the catalog and document tag lists.

use serde::{Deserialize, Serialize};

/// Kind of concept a tag names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagCategory {
    Entity,
    Theme,
    Keyword,
}

impl TagCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entity => "entity",
            Self::Theme => "theme",
            Self::Keyword => "keyword",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "entity" => Some(Self::Entity),
            "theme" => Some(Self::Theme),
            "keyword" => Some(Self::Keyword),
            _ => None,
        }
    }
}

impl std::fmt::Display for TagCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tag, either as a catalog entry or as a per-document copy.
///
/// Document copies reference catalog entries by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub name: String,
    /// Score in `[0, 1]`.
    pub confidence: f32,
    pub category: TagCategory,
}

impl Tag {
    /// Create a tag with a fresh id. Confidence is clamped to `[0, 1]`.
    pub fn new(name: impl Into<String>, confidence: f32, category: TagCategory) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            confidence: clamp_confidence(confidence),
            category,
        }
    }

    /// Key used for case-insensitive name uniqueness in the catalog.
    pub fn name_key(&self) -> String {
        name_key(&self.name)
    }

    /// Whether two tag names collide under catalog rules.
    pub fn same_name(&self, other: &str) -> bool {
        self.name_key() == name_key(other)
    }
}

/// Normalize a tag name for case-insensitive comparison.
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

fn clamp_confidence(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
