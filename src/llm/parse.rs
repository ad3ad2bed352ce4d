//! Lenient parsing of the tag-extraction response.
//!
//! Models are asked for a JSON array but do not always return one. The
//! response goes through an ordered chain of parsers and the first one that
//! yields at least one tag wins:
//!
//! 1. strict: the whole response is a JSON array
//! 2. bracketed: the outermost `[...]` inside surrounding prose is a JSON array
//! 3. quoted: every `"..."` or `'...'` substring is a tag

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tracing::debug;

static THINK_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").unwrap());

static BRACKETED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\[(.*)\]").unwrap());

static QUOTED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"["']([^"']+)["']"#).unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("response is not a JSON array of tags")]
    NotJsonArray,

    #[error("no bracketed list in response")]
    NoBracketedList,

    #[error("no quoted strings in response")]
    NoQuotedStrings,

    #[error("no parser accepted the response")]
    Unparseable,
}

type TagParser = fn(&str) -> Result<Vec<String>, ParseError>;

/// Parsers in the order they are tried.
const PARSERS: &[(&str, TagParser)] = &[
    ("strict", parse_strict),
    ("bracketed", parse_bracketed),
    ("quoted", parse_quoted),
];

/// Parse a tag-extraction response into raw tag strings.
pub fn parse_tag_response(response: &str) -> Result<Vec<String>, ParseError> {
    let cleaned = strip_reasoning(response);

    for (name, parser) in PARSERS {
        match parser(&cleaned) {
            Ok(tags) => {
                debug!("Tag response parsed by {} parser ({} tags)", name, tags.len());
                return Ok(tags);
            }
            Err(e) => debug!("{} parser rejected tag response: {}", name, e),
        }
    }
    Err(ParseError::Unparseable)
}

/// Remove `<think>...</think>` blocks emitted by reasoning models.
pub fn strip_reasoning(response: &str) -> String {
    THINK_BLOCK.replace_all(response, "").trim().to_string()
}

fn parse_strict(text: &str) -> Result<Vec<String>, ParseError> {
    let text = text.trim();
    if !(text.starts_with('[') && text.ends_with(']')) {
        return Err(ParseError::NotJsonArray);
    }
    json_array_tags(text)
}

fn parse_bracketed(text: &str) -> Result<Vec<String>, ParseError> {
    let inner = BRACKETED
        .captures(text)
        .and_then(|c| c.get(1))
        .ok_or(ParseError::NoBracketedList)?;
    json_array_tags(&format!("[{}]", inner.as_str())).map_err(|_| ParseError::NoBracketedList)
}

fn parse_quoted(text: &str) -> Result<Vec<String>, ParseError> {
    let tags: Vec<String> = QUOTED
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();

    if tags.is_empty() {
        Err(ParseError::NoQuotedStrings)
    } else {
        Ok(tags)
    }
}

/// Strings and numbers are accepted as tags; anything else in the array is skipped.
fn json_array_tags(text: &str) -> Result<Vec<String>, ParseError> {
    let values: Vec<serde_json::Value> =
        serde_json::from_str(text).map_err(|_| ParseError::NotJsonArray)?;

    let tags: Vec<String> = values
        .into_iter()
        .filter_map(|v| match v {
            serde_json::Value::String(s) => Some(s),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();

    if tags.is_empty() {
        Err(ParseError::NotJsonArray)
    } else {
        Ok(tags)
    }
}
