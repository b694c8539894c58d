//! Extraction of JSON payloads from model text output.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

static FENCED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^```(?:json)?\n(.*?)\n```$").expect("fence pattern is valid")
});
static OPENING_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^```(?:json)?\n?").expect("fence pattern is valid"));

/// Strip a surrounding Markdown code fence (```` ``` ```` or ```` ```json ````).
///
/// Text without a leading fence is only trimmed. An unterminated fence loses
/// its opening marker and any trailing backticks.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }
    if let Some(inner) = FENCED_RE.captures(trimmed).and_then(|caps| caps.get(1)) {
        return inner.as_str().trim();
    }
    let without_leading = match OPENING_FENCE_RE.find(trimmed) {
        Some(found) => &trimmed[found.end()..],
        None => trimmed,
    };
    without_leading
        .strip_suffix("```")
        .unwrap_or(without_leading)
        .trim()
}

/// Parse model text as a JSON value after removing any code fence.
pub fn parse_json_payload(text: &str) -> Result<Value, serde_json::Error> {
    serde_json::from_str(strip_code_fence(text))
}

/// First `limit` characters of `text`, for log previews.
pub fn preview(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_text_is_trimmed() {
        assert_eq!(strip_code_fence("  {\"steps\": []}\n"), "{\"steps\": []}");
    }

    #[test]
    fn json_fence_is_removed() {
        let text = "```json\n{\"steps\": [{\"action\": \"noop\"}]}\n```";
        assert_eq!(
            parse_json_payload(text).expect("parse"),
            json!({"steps": [{"action": "noop"}]})
        );
    }

    #[test]
    fn bare_and_uppercase_fences_are_removed() {
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("```JSON\n[1]\n```"), "[1]");
    }

    #[test]
    fn unterminated_fence_keeps_body() {
        assert_eq!(strip_code_fence("```json\n{\"a\": 1}"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("```{\"a\": 1}```"), "{\"a\": 1}");
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(parse_json_payload("```json\nnot json\n```").is_err());
    }

    #[test]
    fn preview_counts_characters() {
        assert_eq!(preview("héllo world", 5), "héllo");
    }
}
