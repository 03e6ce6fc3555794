//! Extracting a JSON object out of a free-form model response (spec 4.1).
//!
//! Models wrap JSON in markdown fences, prose, or nothing at all. Three
//! strategies are tried in order; the first one that parses wins.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::errors::{HalliganError, Result};

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)```(?:json)?\s*(\{.*?\})\s*```").expect("fence regex is valid")
    })
}

/// Extract and parse a single JSON object from `text` (spec 4.1).
///
/// Tries, in order: (1) the whole text as JSON, (2) the first fenced
/// \`\`\`json ... \`\`\` block, (3) the span between the first `{` and the
/// last `}`.
///
/// # Errors
/// Returns [`HalliganError::Parse`] if `text` is empty/whitespace-only or
/// none of the three strategies produce valid JSON.
pub fn parse_json_from_response(text: &str) -> Result<Value> {
    if text.trim().is_empty() {
        return Err(HalliganError::parse("empty response text"));
    }

    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return Ok(value);
    }

    if let Some(caps) = fence_re().captures(text) {
        let candidate = &caps[1];
        if let Ok(value) = serde_json::from_str::<Value>(candidate) {
            return Ok(value);
        }
    }

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if end > start {
            let candidate = &text[start..=end];
            if let Ok(value) = serde_json::from_str::<Value>(candidate) {
                return Ok(value);
            }
        }
    }

    Err(HalliganError::parse("no JSON object found in response"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_direct_json() {
        let value = parse_json_from_response(r#"{"a": 1}"#).expect("should parse");
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn parses_fenced_json() {
        let text = "here you go:\n```json\n{\"a\": 2}\n```\nthanks";
        let value = parse_json_from_response(text).expect("should parse");
        assert_eq!(value["a"], 2);
    }

    #[test]
    fn parses_fenced_json_without_language_tag() {
        let text = "```\n{\"a\": 3}\n```";
        let value = parse_json_from_response(text).expect("should parse");
        assert_eq!(value["a"], 3);
    }

    #[test]
    fn parses_brace_span_when_surrounded_by_prose() {
        let text = "Sure! {\"a\": 4} — let me know if you need more.";
        let value = parse_json_from_response(text).expect("should parse");
        assert_eq!(value["a"], 4);
    }

    #[test]
    fn rejects_empty_text() {
        assert!(parse_json_from_response("   ").is_err());
    }

    #[test]
    fn rejects_text_with_no_json() {
        assert!(parse_json_from_response("no json here at all").is_err());
    }
}
