//! Deterministic tags and summary used when remote generation fails.

use crate::models::{Tag, TagCategory};

/// Summary recorded when no summary could be generated.
pub const FALLBACK_SUMMARY: &str = "无法生成摘要";

/// Tag emitted when no keyword rule matches.
pub const UNCATEGORIZED_TAG: &str = "未分类";

struct KeywordRule {
    tag: &'static str,
    needles: &'static [&'static str],
    category: TagCategory,
    confidence: f32,
}

/// Rules in scan order; each rule contributes at most one tag.
const KEYWORD_RULES: &[KeywordRule] = &[
    KeywordRule {
        tag: "财务",
        needles: &["财务", "finance", "financial"],
        category: TagCategory::Theme,
        confidence: 0.85,
    },
    KeywordRule {
        tag: "报告",
        needles: &["报告", "report"],
        category: TagCategory::Keyword,
        confidence: 0.8,
    },
    KeywordRule {
        tag: "2023年",
        needles: &["2023"],
        category: TagCategory::Entity,
        confidence: 0.9,
    },
    KeywordRule {
        tag: "重要",
        needles: &["重要", "紧急", "important", "urgent"],
        category: TagCategory::Keyword,
        confidence: 0.75,
    },
    KeywordRule {
        tag: "计划",
        needles: &["计划", "plan"],
        category: TagCategory::Theme,
        confidence: 0.8,
    },
    KeywordRule {
        tag: "项目",
        needles: &["项目", "project"],
        category: TagCategory::Theme,
        confidence: 0.8,
    },
    KeywordRule {
        tag: "技术",
        needles: &["技术", "tech"],
        category: TagCategory::Theme,
        confidence: 0.8,
    },
    KeywordRule {
        tag: "会议",
        needles: &["会议", "meeting"],
        category: TagCategory::Keyword,
        confidence: 0.8,
    },
];

/// Scan the lower-cased text for known keywords.
///
/// Always returns at least one tag.
pub fn fallback_tags(text: &str) -> Vec<Tag> {
    let haystack = text.to_lowercase();

    let mut tags: Vec<Tag> = KEYWORD_RULES
        .iter()
        .filter(|rule| rule.needles.iter().any(|n| haystack.contains(n)))
        .map(|rule| Tag::new(rule.tag, rule.confidence, rule.category))
        .collect();

    if tags.is_empty() {
        tags.push(Tag::new(UNCATEGORIZED_TAG, 0.5, TagCategory::Keyword));
    }
    tags
}

pub fn fallback_summary() -> String {
    FALLBACK_SUMMARY.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(tags: &[Tag]) -> Vec<&str> {
        tags.iter().map(|t| t.name.as_str()).collect()
    }

    #[test]
    fn test_scan_order() {
        let tags = fallback_tags("2023年度财务报告");
        assert_eq!(names(&tags), vec!["财务", "报告", "2023年"]);
        assert_eq!(tags[2].category, TagCategory::Entity);
    }

    #[test]
    fn test_case_insensitive_english() {
        let tags = fallback_tags("URGENT: Project Meeting notes");
        assert_eq!(names(&tags), vec!["重要", "项目", "会议"]);
    }

    #[test]
    fn test_sentinel_when_nothing_matches() {
        for text in ["", "   ", "lorem ipsum"] {
            let tags = fallback_tags(text);
            assert_eq!(names(&tags), vec![UNCATEGORIZED_TAG]);
        }
    }

    #[test]
    fn test_each_rule_at_most_once() {
        let tags = fallback_tags("finance financial 财务 finance");
        assert_eq!(names(&tags), vec!["财务"]);
    }
}
