//! LLM client configuration.

use serde::{Deserialize, Serialize};

use super::prompts::{DEFAULT_SUMMARY_PROMPT, DEFAULT_TAGS_PROMPT};

/// Configuration for the chat-completion client and the tag/summary requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Whether remote generation is enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Base URL of the OpenAI-compatible API (`/chat/completions` is appended)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Bearer token; never compiled in, only read from config or environment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Model used for tag extraction
    #[serde(default = "default_tag_model")]
    pub tag_model: String,
    /// Model used for summaries
    #[serde(default = "default_summary_model")]
    pub summary_model: String,
    #[serde(default = "default_tag_temperature")]
    pub tag_temperature: f32,
    #[serde(default = "default_summary_temperature")]
    pub summary_temperature: f32,
    /// Maximum tokens in response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Maximum characters of document content to send
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,
    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Summaries longer than this many characters are cut
    #[serde(default = "default_summary_max_chars")]
    pub summary_max_chars: usize,
    /// Custom system prompt for tag extraction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags_prompt: Option<String>,
    /// Custom system prompt for summaries (uses the {max_chars} placeholder)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_prompt: Option<String>,
}

fn default_enabled() -> bool {
    true
}

fn default_endpoint() -> String {
    "https://api.siliconflow.cn/v1".to_string()
}

fn default_tag_model() -> String {
    "Pro/deepseek-ai/DeepSeek-R1".to_string()
}

fn default_summary_model() -> String {
    "Qwen/Qwen2.5-7B-Instruct".to_string()
}

fn default_tag_temperature() -> f32 {
    0.2
}

fn default_summary_temperature() -> f32 {
    0.3
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_max_content_chars() -> usize {
    12000
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_summary_max_chars() -> usize {
    100
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self::base_default().with_env_overrides()
    }
}

impl LlmConfig {
    /// Base default without env overrides.
    pub fn base_default() -> Self {
        Self {
            enabled: default_enabled(),
            endpoint: default_endpoint(),
            api_key: None,
            tag_model: default_tag_model(),
            summary_model: default_summary_model(),
            tag_temperature: default_tag_temperature(),
            summary_temperature: default_summary_temperature(),
            max_tokens: default_max_tokens(),
            max_content_chars: default_max_content_chars(),
            timeout_secs: default_timeout_secs(),
            summary_max_chars: default_summary_max_chars(),
            tags_prompt: None,
            summary_prompt: None,
        }
    }

    /// Check if the config equals the default (for skip_serializing_if).
    pub fn is_default(&self) -> bool {
        *self == Self::base_default()
    }

    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `LLM_ENABLED`: "true" or "false"
    /// - `LLM_ENDPOINT`: API base URL
    /// - `LLM_API_KEY`: bearer token (falls back to `SILICONFLOW_API_KEY`, then `OPENAI_API_KEY`)
    /// - `LLM_TAG_MODEL`, `LLM_SUMMARY_MODEL`: model names
    /// - `LLM_MAX_CONTENT_CHARS`: max document characters to send
    /// - `LLM_TIMEOUT_SECS`: request timeout
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("LLM_ENABLED") {
            self.enabled = val.eq_ignore_ascii_case("true") || val == "1";
        }
        if let Ok(val) = std::env::var("LLM_ENDPOINT") {
            self.endpoint = val;
        }

        // Explicit key wins, then provider-specific keys
        let key = std::env::var("LLM_API_KEY")
            .or_else(|_| std::env::var("SILICONFLOW_API_KEY"))
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .ok()
            .filter(|k| !k.trim().is_empty());
        if key.is_some() {
            self.api_key = key;
        }

        if let Ok(val) = std::env::var("LLM_TAG_MODEL") {
            self.tag_model = val;
        }
        if let Ok(val) = std::env::var("LLM_SUMMARY_MODEL") {
            self.summary_model = val;
        }
        if let Ok(val) = std::env::var("LLM_MAX_CONTENT_CHARS") {
            if let Ok(n) = val.parse() {
                self.max_content_chars = n;
            }
        }
        if let Ok(val) = std::env::var("LLM_TIMEOUT_SECS") {
            if let Ok(n) = val.parse() {
                self.timeout_secs = n;
            }
        }
        self
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Full URL of the chat-completion route.
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.endpoint.trim_end_matches('/'))
    }

    /// Get the tags prompt, using custom or default.
    pub fn get_tags_prompt(&self) -> &str {
        self.tags_prompt.as_deref().unwrap_or(DEFAULT_TAGS_PROMPT)
    }

    /// Get the summary prompt with the length limit filled in.
    pub fn get_summary_prompt(&self) -> String {
        self.summary_prompt
            .as_deref()
            .unwrap_or(DEFAULT_SUMMARY_PROMPT)
            .replace("{max_chars}", &self.summary_max_chars.to_string())
    }

    /// API key with everything but the first few characters masked.
    pub fn redacted_api_key(&self) -> Option<String> {
        self.api_key.as_ref().map(|key| {
            let visible: String = key.chars().take(4).collect();
            format!("{}****", visible)
        })
    }
}
