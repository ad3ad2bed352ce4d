//! Default system prompts for tag and summary generation.

/// Default system prompt for tag extraction.
pub const DEFAULT_TAGS_PROMPT: &str = r#"You extract search tags from documents. Read the text supplied by the user and return 5-10 short words or phrases that capture its main subject, themes and key entities. Write the tags in the same language as the document.

Respond with ONLY a JSON array of strings, for example ["tag one", "tag two"]. No explanations, no formatting, no other output."#;

/// Default system prompt for summaries. `{max_chars}` is replaced with the length limit.
pub const DEFAULT_SUMMARY_PROMPT: &str = r#"You write concise document summaries. Summarize the text supplied by the user in at most {max_chars} characters, covering its main content and core information. Write in the same language as the document.

Respond with ONLY the summary text. No preamble, no formatting."#;
