//! Tag and summary generation with per-call fallback.
//!
//! Each call moves `Idle -> Requesting -> Succeeded | FallbackApplied`. The tag
//! and summary calls run concurrently and fall back independently, so
//! [`TagGenerator::generate`] always returns a complete result.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::client::{truncate_content, CompletionBackend, CompletionRequest, LlmClient, LlmConfig};
use super::fallback::{fallback_summary, fallback_tags};
use super::parse::{parse_tag_response, strip_reasoning};
use crate::models::{name_key, Tag, TagCategory};

/// Most tags kept from a remote response.
pub const MAX_REMOTE_TAGS: usize = 10;

/// Remote tags longer than this (in chars) are dropped.
const MAX_TAG_CHARS: usize = 50;

/// Lifecycle of one generation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationState {
    Idle,
    Requesting,
    Succeeded,
    FallbackApplied,
}

impl GenerationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Requesting => "requesting",
            Self::Succeeded => "succeeded",
            Self::FallbackApplied => "fallback-applied",
        }
    }
}

/// How a single call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    Succeeded,
    FallbackApplied { reason: String },
}

impl CallOutcome {
    pub fn state(&self) -> GenerationState {
        match self {
            Self::Succeeded => GenerationState::Succeeded,
            Self::FallbackApplied { .. } => GenerationState::FallbackApplied,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::FallbackApplied { .. })
    }

    fn fallback(reason: impl ToString) -> Self {
        Self::FallbackApplied {
            reason: reason.to_string(),
        }
    }
}

/// Tags and summary for one document.
#[derive(Debug, Clone)]
pub struct Generated {
    pub tags: Vec<Tag>,
    pub summary: String,
    pub tags_outcome: CallOutcome,
    pub summary_outcome: CallOutcome,
}

impl Generated {
    pub fn used_fallback(&self) -> bool {
        self.tags_outcome.is_fallback() || self.summary_outcome.is_fallback()
    }
}

/// Generates tags and a summary, remotely when possible.
pub struct TagGenerator {
    backend: Option<Arc<dyn CompletionBackend>>,
    config: LlmConfig,
}

impl TagGenerator {
    pub fn new(backend: Arc<dyn CompletionBackend>, config: LlmConfig) -> Self {
        Self {
            backend: Some(backend),
            config,
        }
    }

    /// A generator that never calls out and always applies the fallback.
    pub fn offline(config: LlmConfig) -> Self {
        Self {
            backend: None,
            config,
        }
    }

    /// Build an HTTP-backed generator, or an offline one if remote generation is unusable.
    pub fn from_config(config: LlmConfig) -> Self {
        if !config.enabled {
            info!("Remote generation disabled, using keyword fallback");
            return Self::offline(config);
        }
        match LlmClient::new(config.clone()) {
            Ok(client) => Self::new(Arc::new(client), config),
            Err(e) => {
                warn!("Could not create LLM client, using keyword fallback: {}", e);
                Self::offline(config)
            }
        }
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    pub fn is_offline(&self) -> bool {
        self.backend.is_none()
    }

    /// Generate tags and a summary. Never fails.
    pub async fn generate(&self, text: &str) -> Generated {
        let ((tags, tags_outcome), (summary, summary_outcome)) =
            tokio::join!(self.generate_tags(text), self.generate_summary(text));

        Generated {
            tags,
            summary,
            tags_outcome,
            summary_outcome,
        }
    }

    /// Remote tag extraction with keyword fallback.
    pub async fn generate_tags(&self, text: &str) -> (Vec<Tag>, CallOutcome) {
        let request = CompletionRequest {
            model: self.config.tag_model.clone(),
            system: self.config.get_tags_prompt().to_string(),
            user: truncate_content(text, self.config.max_content_chars).to_string(),
            temperature: self.config.tag_temperature,
            max_tokens: self.config.max_tokens,
        };

        let result = match self.request("tags", text, &request).await {
            Ok(response) => parse_tag_response(&response)
                .map_err(|e| e.to_string())
                .map(remote_tags)
                .and_then(|tags| {
                    if tags.is_empty() {
                        Err("no usable tags in response".to_string())
                    } else {
                        Ok(tags)
                    }
                }),
            Err(reason) => Err(reason),
        };

        match result {
            Ok(tags) => {
                debug!("tags call {}", GenerationState::Succeeded.as_str());
                (tags, CallOutcome::Succeeded)
            }
            Err(reason) => {
                warn!("Tag generation failed, applying keyword fallback: {}", reason);
                (fallback_tags(text), CallOutcome::fallback(reason))
            }
        }
    }

    /// Remote summary with placeholder fallback.
    pub async fn generate_summary(&self, text: &str) -> (String, CallOutcome) {
        let request = CompletionRequest {
            model: self.config.summary_model.clone(),
            system: self.config.get_summary_prompt(),
            user: truncate_content(text, self.config.max_content_chars).to_string(),
            temperature: self.config.summary_temperature,
            max_tokens: self.config.max_tokens,
        };

        let result = self.request("summary", text, &request).await.and_then(|response| {
            let summary = clip_chars(&strip_reasoning(&response), self.config.summary_max_chars);
            if summary.is_empty() {
                Err("empty summary".to_string())
            } else {
                Ok(summary)
            }
        });

        match result {
            Ok(summary) => {
                debug!("summary call {}", GenerationState::Succeeded.as_str());
                (summary, CallOutcome::Succeeded)
            }
            Err(reason) => {
                warn!("Summary generation failed, using placeholder: {}", reason);
                (fallback_summary(), CallOutcome::fallback(reason))
            }
        }
    }

    async fn request(
        &self,
        call: &str,
        text: &str,
        request: &CompletionRequest,
    ) -> Result<String, String> {
        let backend = match &self.backend {
            Some(backend) if !text.trim().is_empty() => backend,
            other => {
                let reason = if other.is_none() {
                    "remote generation disabled"
                } else {
                    "no text content"
                };
                debug!("{} call stays {}: {}", call, GenerationState::Idle.as_str(), reason);
                return Err(reason.to_string());
            }
        };

        debug!("{} call {}", call, GenerationState::Requesting.as_str());
        backend.complete(request).await.map_err(|e| e.to_string())
    }
}

/// Normalize remote tag strings into tags: trimmed, deduplicated
/// case-insensitively, capped, with rank-based confidence.
fn remote_tags(raw: Vec<String>) -> Vec<Tag> {
    let mut seen = std::collections::HashSet::new();

    raw.into_iter()
        .map(|t| t.trim().trim_start_matches('#').trim().to_string())
        .filter(|t| !t.is_empty() && t.chars().count() <= MAX_TAG_CHARS)
        .filter(|t| seen.insert(name_key(t)))
        .take(MAX_REMOTE_TAGS)
        .enumerate()
        .map(|(rank, name)| {
            let confidence = (0.95 - 0.05 * rank as f32).max(0.5);
            let category = if name.chars().any(|c| c.is_ascii_digit()) {
                TagCategory::Entity
            } else if rank < 3 {
                TagCategory::Theme
            } else {
                TagCategory::Keyword
            };
            Tag::new(name, confidence, category)
        })
        .collect()
}

fn clip_chars(text: &str, max: usize) -> String {
    text.trim().chars().take(max).collect::<String>().trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::LlmError;
    use crate::llm::fallback::{FALLBACK_SUMMARY, UNCATEGORIZED_TAG};
    use async_trait::async_trait;

    /// Answers by model name; `None` means the call fails.
    struct Scripted {
        tags: Option<String>,
        summary: Option<String>,
    }

    #[async_trait]
    impl CompletionBackend for Scripted {
        async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
            let answer = if request.model == "tag-model" {
                &self.tags
            } else {
                &self.summary
            };
            answer.clone().ok_or(LlmError::Api {
                status: 500,
                body: "boom".to_string(),
            })
        }
    }

    fn generator(tags: Option<&str>, summary: Option<&str>) -> TagGenerator {
        let mut config = LlmConfig::base_default();
        config.tag_model = "tag-model".to_string();
        config.summary_model = "summary-model".to_string();
        let backend = Scripted {
            tags: tags.map(str::to_string),
            summary: summary.map(str::to_string),
        };
        TagGenerator::new(Arc::new(backend), config)
    }

    fn names(tags: &[Tag]) -> Vec<&str> {
        tags.iter().map(|t| t.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_remote_success() {
        let gen = generator(Some(r#"["Budget", "2023", "memo"]"#), Some("A budget memo."));
        let out = gen.generate("budget memo text").await;

        assert_eq!(names(&out.tags), vec!["Budget", "2023", "memo"]);
        assert_eq!(out.tags[1].category, TagCategory::Entity);
        assert_eq!(out.tags[0].category, TagCategory::Theme);
        assert_eq!(out.summary, "A budget memo.");
        assert!(!out.used_fallback());
    }

    #[tokio::test]
    async fn test_calls_fall_back_independently() {
        let gen = generator(None, Some("summary ok"));
        let out = gen.generate("2023年度财务报告").await;

        assert_eq!(names(&out.tags), vec!["财务", "报告", "2023年"]);
        assert!(out.tags_outcome.is_fallback());
        assert_eq!(out.summary, "summary ok");
        assert_eq!(out.summary_outcome, CallOutcome::Succeeded);
    }

    #[tokio::test]
    async fn test_unparseable_tags_fall_back() {
        let gen = generator(Some("I cannot help with that"), None);
        let out = gen.generate("meeting").await;
        assert_eq!(names(&out.tags), vec!["会议"]);
        assert_eq!(out.summary, FALLBACK_SUMMARY);
        assert_eq!(out.summary_outcome.state(), GenerationState::FallbackApplied);
    }

    #[test]
    fn test_disabled_config_is_offline() {
        let mut config = LlmConfig::base_default();
        config.enabled = false;
        assert!(TagGenerator::from_config(config).is_offline());
        assert!(!generator(None, None).is_offline());
    }

    #[tokio::test]
    async fn test_empty_text_never_fails() {
        let out = TagGenerator::offline(LlmConfig::base_default())
            .generate("")
            .await;
        assert_eq!(names(&out.tags), vec![UNCATEGORIZED_TAG]);
        assert_eq!(out.summary, FALLBACK_SUMMARY);
    }

    #[tokio::test]
    async fn test_summary_clipped_and_reasoning_removed() {
        let long = format!("<think>hmm</think>{}", "字".repeat(150));
        let gen = generator(Some(r#"["a"]"#), Some(&long));
        let (summary, outcome) = gen.generate_summary("text").await;
        assert_eq!(outcome, CallOutcome::Succeeded);
        assert_eq!(summary.chars().count(), 100);
        assert!(!summary.contains("think"));
    }

    #[tokio::test]
    async fn test_whitespace_summary_falls_back() {
        let gen = generator(Some(r#"["a"]"#), Some("<think>x</think>   "));
        let (summary, outcome) = gen.generate_summary("text").await;
        assert_eq!(summary, FALLBACK_SUMMARY);
        assert!(outcome.is_fallback());
    }

    #[test]
    fn test_remote_tags_normalized() {
        let raw = vec![
            " Finance ".to_string(),
            "finance".to_string(),
            "#report".to_string(),
            "".to_string(),
            "x".repeat(60),
        ];
        let tags = remote_tags(raw);
        assert_eq!(names(&tags), vec!["Finance", "report"]);
        assert!(tags[0].confidence > tags[1].confidence);
    }

    #[test]
    fn test_remote_tags_capped() {
        let raw: Vec<String> = (0..15).map(|i| format!("tag{}", i)).collect();
        assert_eq!(remote_tags(raw).len(), MAX_REMOTE_TAGS);
    }
}
