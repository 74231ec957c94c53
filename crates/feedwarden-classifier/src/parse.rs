//! Typed parse step for classifier replies.
//!
//! Completion text is untrusted. Each parser either yields a typed value or a
//! `ClassifyError::Malformed`; nothing untyped leaves this module.

use serde::Deserialize;

use crate::error::{ClassifyError, ClassifyResult};
use crate::verdict::{Rating, ShownEntry, ShownSet, Verdict};

#[derive(Deserialize)]
struct RawVerdict {
    evaluation_rating: Rating,
    #[serde(default)]
    evaluation_context: String,
}

#[derive(Deserialize)]
struct RawShownEntry {
    id: String,
    #[serde(default)]
    reason: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawShown {
    Wrapped { videos: Vec<RawShownEntry> },
    Bare(Vec<RawShownEntry>),
}

/// Strip Markdown code fences and a stray leading `json` tag.
pub fn unwrap_payload(text: &str) -> &str {
    let mut t = text.trim();
    if let Some(rest) = t.strip_prefix("```") {
        let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
        t = rest.strip_suffix("```").unwrap_or(rest).trim();
    }
    match t.strip_prefix("json") {
        Some(rest) if rest.trim_start().starts_with(['{', '[']) => rest.trim_start(),
        _ => t,
    }
}

/// Parse a title verdict: `{"evaluation_rating": .., "evaluation_context": ..}`.
pub fn parse_verdict(text: &str) -> ClassifyResult<Verdict> {
    let payload = unwrap_payload(text);
    if payload.is_empty() {
        return Err(ClassifyError::Malformed("empty verdict response".into()));
    }
    let raw: RawVerdict = serde_json::from_str(payload)?;
    Ok(Verdict::new(raw.evaluation_rating, raw.evaluation_context))
}

/// Parse a recommendation filter reply: `{"videos": [{"id", "reason"}]}` or
/// a bare array of the same entries.
pub fn parse_shown_set(text: &str) -> ClassifyResult<ShownSet> {
    let payload = unwrap_payload(text);
    if payload.is_empty() {
        return Err(ClassifyError::Malformed("empty filter response".into()));
    }
    let raw: RawShown = serde_json::from_str(payload)
        .map_err(|e| ClassifyError::Malformed(format!("unexpected filter shape: {e}")))?;
    let entries = match raw {
        RawShown::Wrapped { videos } => videos,
        RawShown::Bare(videos) => videos,
    };
    Ok(ShownSet::new(
        entries
            .into_iter()
            .map(|e| ShownEntry {
                id: e.id,
                reason: e.reason,
            })
            .collect(),
    ))
}

/// Free-text replies only need to be non-empty.
pub fn parse_text(text: &str) -> ClassifyResult<String> {
    let t = text.trim();
    if t.is_empty() {
        Err(ClassifyError::Malformed("empty text response".into()))
    } else {
        Ok(t.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_verdict_plain() {
        let v = parse_verdict(
            r#"{"evaluation_rating":"avoid","evaluation_context":"Nice try, back to work."}"#,
        )
        .unwrap();
        assert_eq!(v.rating, Rating::Avoid);
        assert_eq!(v.rationale, "Nice try, back to work.");
    }

    #[test]
    fn test_parse_verdict_fenced() {
        let text = "```json\n{\"evaluation_rating\":\"relevant\",\"evaluation_context\":\"ok\"}\n```";
        assert_eq!(parse_verdict(text).unwrap().rating, Rating::Relevant);
    }

    #[test]
    fn test_parse_verdict_leading_json_word() {
        let text = "json {\"evaluation_rating\":\"not_sure\"}";
        let v = parse_verdict(text).unwrap();
        assert_eq!(v.rating, Rating::NotSure);
        assert!(v.rationale.is_empty());
    }

    #[test]
    fn test_parse_verdict_unknown_rating_is_malformed() {
        let err = parse_verdict(r#"{"evaluation_rating":"great"}"#).unwrap_err();
        assert!(matches!(err, ClassifyError::Malformed(_)));
    }

    #[test]
    fn test_parse_verdict_placeholder_text_is_malformed() {
        let err = parse_verdict("No response from Anthropic.").unwrap_err();
        assert!(matches!(err, ClassifyError::Malformed(_)));
    }

    #[test]
    fn test_parse_shown_set_wrapped_and_bare() {
        let wrapped = parse_shown_set(r#"{"videos":[{"id":"video-1","reason":"on goal"}]}"#)
            .unwrap();
        assert_eq!(wrapped.reason_for("video-1"), Some("on goal"));

        let bare = parse_shown_set(r#"[{"id":"video-2","reason":"fits"}]"#).unwrap();
        assert!(bare.contains("video-2"));
    }

    #[test]
    fn test_parse_shown_set_empty_list_is_valid() {
        let set = parse_shown_set(r#"{"videos":[]}"#).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_parse_shown_set_wrong_shape_is_malformed() {
        let err = parse_shown_set(r#"{"items":[{"id":"video-1"}]}"#).unwrap_err();
        assert!(matches!(err, ClassifyError::Malformed(_)));
        let err = parse_shown_set("").unwrap_err();
        assert!(matches!(err, ClassifyError::Malformed(_)));
    }

    #[test]
    fn test_unwrap_payload_leaves_plain_text() {
        assert_eq!(unwrap_payload("  {\"a\":1} "), "{\"a\":1}");
        assert_eq!(unwrap_payload("jsonish text"), "jsonish text");
    }
}
