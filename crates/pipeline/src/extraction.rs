//! Recovery of a [`RequirementsDocument`] from raw model output.
//!
//! Model output is not guaranteed to be clean JSON: it may be wrapped in
//! Markdown fences, surrounded by prose, or carry several JSON fragments.
//! [`extract_document`] tries, in order:
//!
//! 1. strip code-fence markers, then parse;
//! 2. parse the span from the first `{` to the last `}`;
//! 3. scan for balanced-brace object candidates (one level of nesting) and
//!    parse them from largest/last to smallest/first.
//!
//! The first strategy that yields a JSON *object* wins. The object is then
//! converted leniently: only a missing or non-array `epics` field fails the
//! document; malformed nested items are dropped or defaulted individually.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::{
    Category, Epic, ParseError, Priority, RequirementsDocument, ResponsePreview, Story, Subtask,
};

/// Deepest object nesting the balanced-brace scan accepts.
///
/// `1` means the top-level object plus one level of nested objects.
const MAX_NESTED_DEPTH: usize = 1;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Parses raw model output into a validated document.
///
/// Never panics; every failure is a [`ParseError`] carrying a bounded preview
/// of `raw`.
pub fn extract_document(raw: &str) -> Result<RequirementsDocument, ParseError> {
    let Some(object) = locate_json_object(raw) else {
        warn!(
            chars = raw.chars().count(),
            "no JSON object could be recovered from the AI response"
        );
        return Err(ParseError::InvalidJson {
            preview: ResponsePreview::of(raw),
        });
    };
    document_from_object(&object).ok_or_else(|| ParseError::MissingEpics {
        preview: ResponsePreview::of(raw),
    })
}

/// Recovers the first JSON object found by the ordered strategies.
pub fn locate_json_object(raw: &str) -> Option<Map<String, Value>> {
    if let Some(object) = parse_object(&strip_code_fences(raw)) {
        debug!(strategy = "fence-strip", "recovered JSON object");
        return Some(object);
    }

    if let Some(span) = outer_brace_span(raw) {
        if let Some(object) = parse_object(span) {
            debug!(strategy = "outer-braces", "recovered JSON object");
            return Some(object);
        }
    }

    let mut candidates = balanced_candidates(raw, MAX_NESTED_DEPTH);
    // Last first, then a stable sort puts the largest in front.
    candidates.reverse();
    candidates.sort_by(|a, b| b.len().cmp(&a.len()));
    let found = candidates.into_iter().find_map(parse_object);
    if found.is_some() {
        debug!(strategy = "balanced-scan", "recovered JSON object");
    }
    found
}

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn strip_code_fences(raw: &str) -> String {
    raw.replace("```json", "")
        .replace("```JSON", "")
        .replace("```", "")
        .trim()
        .to_string()
}

fn outer_brace_span(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

/// Finds non-overlapping balanced `{...}` spans, left to right.
///
/// Braces inside JSON string literals are ignored. A span whose nesting goes
/// deeper than `max_depth` below its opening brace is abandoned and the scan
/// resumes at the next `{`, so deeply nested inner objects can still be found.
/// Braces are ASCII, so every returned slice starts and ends on a UTF-8
/// boundary.
fn balanced_candidates(raw: &str, max_depth: usize) -> Vec<&str> {
    let bytes = raw.as_bytes();
    let mut found = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' {
            if let Some(end) = match_object(bytes, i, max_depth) {
                found.push(&raw[i..=end]);
                i = end + 1;
                continue;
            }
        }
        i += 1;
    }
    found
}

fn match_object(bytes: &[u8], start: usize, max_depth: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => {
                depth += 1;
                if depth > max_depth + 1 {
                    return None;
                }
            }
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + offset);
                }
            }
            _ => {}
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Lenient conversion
// ---------------------------------------------------------------------------

fn document_from_object(object: &Map<String, Value>) -> Option<RequirementsDocument> {
    let raw_epics = object.get("epics")?.as_array()?;
    let epics: Vec<Epic> = raw_epics
        .iter()
        .enumerate()
        .filter_map(|(index, value)| epic_from_value(index, value))
        .collect();
    if epics.len() != raw_epics.len() {
        warn!(
            dropped = raw_epics.len() - epics.len(),
            "dropped malformed epics from the AI response"
        );
    }
    Some(RequirementsDocument { epics })
}

fn epic_from_value(index: usize, value: &Value) -> Option<Epic> {
    let object = value.as_object()?;
    let Some(summary) = summary_of(object) else {
        warn!(index, "epic without a summary skipped");
        return None;
    };
    Some(Epic {
        summary,
        description: string_field(object, "description"),
        category: object
            .get("category")
            .and_then(Value::as_str)
            .map(Category::parse_lenient)
            .unwrap_or_default(),
        number: label_field(object, "epicNumber"),
        stories: children(object, "stories", story_from_value),
    })
}

fn story_from_value(index: usize, value: &Value) -> Option<Story> {
    let object = value.as_object()?;
    let Some(summary) = summary_of(object) else {
        warn!(index, "story without a summary skipped");
        return None;
    };
    Some(Story {
        summary,
        description: string_field(object, "description"),
        priority: object
            .get("priority")
            .and_then(Value::as_str)
            .map(Priority::parse_lenient)
            .unwrap_or_default(),
        number: label_field(object, "storyNumber"),
        subtasks: children(object, "subtasks", subtask_from_value),
    })
}

fn subtask_from_value(index: usize, value: &Value) -> Option<Subtask> {
    let object = value.as_object()?;
    let Some(summary) = summary_of(object) else {
        warn!(index, "subtask without a summary skipped");
        return None;
    };
    Some(Subtask {
        summary,
        description: string_field(object, "description"),
        number: label_field(object, "subtaskNumber"),
    })
}

fn children<T>(
    object: &Map<String, Value>,
    key: &str,
    convert: fn(usize, &Value) -> Option<T>,
) -> Vec<T> {
    object
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .enumerate()
                .filter_map(|(index, item)| convert(index, item))
                .collect()
        })
        .unwrap_or_default()
}

fn summary_of(object: &Map<String, Value>) -> Option<String> {
    let summary = string_field(object, "summary");
    let trimmed = summary.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn string_field(object: &Map<String, Value>, key: &str) -> String {
    object
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Numbering labels arrive as strings or numbers; both are kept as text.
fn label_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const LOGIN: &str = r#"{"epics":[{"summary":"Login","stories":[{"summary":"As a user I can log in","subtasks":[{"summary":"Add login form"}]}]}]}"#;

    #[test]
    fn parses_clean_json() {
        let doc = extract_document(LOGIN).unwrap();
        assert_eq!(doc.epics.len(), 1);
        assert_eq!(doc.epics[0].summary, "Login");
        assert_eq!(doc.epics[0].stories[0].subtasks[0].summary, "Add login form");
    }

    #[test]
    fn parses_fenced_json() {
        let raw = format!("```json\n{LOGIN}\n```");
        assert_eq!(extract_document(&raw).unwrap().epics[0].summary, "Login");
    }

    #[test]
    fn parses_json_surrounded_by_prose() {
        let raw = format!(
            "Sure! Here is the breakdown you asked for:\n\n{LOGIN}\n\nLet me know if you need more."
        );
        assert_eq!(extract_document(&raw).unwrap().epics[0].summary, "Login");
    }

    #[test]
    fn falls_back_to_balanced_scan_when_outer_span_is_broken() {
        // The outer span runs from the first `{` in the prose to the final
        // `}`, which is not valid JSON; only the balanced scan recovers it.
        let raw = r#"Use {braces} wisely. {"epics": [], "note": {"k": "v"}} trailing }"#;
        let doc = extract_document(raw).unwrap();
        assert!(doc.epics.is_empty());
    }

    #[test]
    fn balanced_scan_prefers_largest_candidate() {
        let raw = r#"{"a": 1} then {"epics": [], "x": {"y": 2}} oops {"#;
        let object = locate_json_object(raw).unwrap();
        assert!(object.contains_key("epics"));
    }

    #[test]
    fn balanced_scan_ignores_braces_in_strings() {
        let candidates = balanced_candidates(r#"x {"s": "}{"} y"#, MAX_NESTED_DEPTH);
        assert_eq!(candidates, vec![r#"{"s": "}{"}"#]);
    }

    #[test]
    fn balanced_scan_respects_depth_bound() {
        let candidates = balanced_candidates(r#"{"a": {"b": {"c": 1}}}"#, MAX_NESTED_DEPTH);
        // The outer object is too deep; its inner `{"b": {...}}` fits.
        assert_eq!(candidates, vec![r#"{"b": {"c": 1}}"#]);
    }

    #[test]
    fn text_without_json_is_invalid() {
        let err = extract_document("I could not find any requirements, sorry.").unwrap_err();
        assert!(matches!(err, ParseError::InvalidJson { .. }));
        assert_eq!(err.preview().head, "I could not find any requirements, sorry.");
    }

    #[test]
    fn non_object_json_is_invalid() {
        assert!(matches!(
            extract_document("[1, 2, 3]").unwrap_err(),
            ParseError::InvalidJson { .. }
        ));
        assert!(matches!(
            extract_document("").unwrap_err(),
            ParseError::InvalidJson { .. }
        ));
    }

    #[test]
    fn huge_invalid_response_yields_bounded_preview() {
        let raw = "x".repeat(100_000);
        let err = extract_document(&raw).unwrap_err();
        let preview = err.preview();
        assert_eq!(preview.total_chars, 100_000);
        assert!(preview.head.len() + preview.tail.len() <= 2 * ResponsePreview::EDGE_CHARS);
    }

    #[test]
    fn object_without_epics_is_rejected() {
        assert!(matches!(
            extract_document(r#"{"stories": []}"#).unwrap_err(),
            ParseError::MissingEpics { .. }
        ));
        assert!(matches!(
            extract_document(r#"{"epics": "none"}"#).unwrap_err(),
            ParseError::MissingEpics { .. }
        ));
    }

    #[test]
    fn empty_epics_is_a_valid_document() {
        assert_eq!(
            extract_document(r#"{"epics": []}"#).unwrap(),
            RequirementsDocument::default()
        );
    }

    #[test]
    fn malformed_nested_items_degrade_gracefully() {
        let raw = r#"{
            "epics": [
                {
                    "summary": "Payments",
                    "description": 42,
                    "category": "NON-FUNCTIONAL",
                    "epicNumber": 3,
                    "stories": [
                        "not an object",
                        {"description": "no summary"},
                        {"summary": "Refunds", "priority": "urgent", "subtasks": "n/a"},
                        {"summary": "Checkout", "priority": "HIGH", "storyNumber": "3.2",
                         "subtasks": [{"summary": "Card form", "subtaskNumber": "1"}, 7]}
                    ]
                },
                {"summary": "   "}
            ]
        }"#;
        let doc = extract_document(raw).unwrap();
        assert_eq!(doc.epics.len(), 1);

        let epic = &doc.epics[0];
        assert_eq!(epic.description, "");
        assert_eq!(epic.category, Category::NonFunctional);
        assert_eq!(epic.number.as_deref(), Some("3"));
        assert_eq!(epic.stories.len(), 2);

        let refunds = &epic.stories[0];
        assert_eq!(refunds.priority, Priority::Unspecified);
        assert!(refunds.subtasks.is_empty());

        let checkout = &epic.stories[1];
        assert_eq!(checkout.priority, Priority::High);
        assert_eq!(checkout.number.as_deref(), Some("3.2"));
        assert_eq!(checkout.subtasks.len(), 1);
        assert_eq!(checkout.subtasks[0].number.as_deref(), Some("1"));
    }

    #[test]
    fn multibyte_prose_around_json_is_handled() {
        let raw = format!("Voilà · résumé: {LOGIN} ✓ fin");
        assert_eq!(extract_document(&raw).unwrap().epics.len(), 1);
    }
}
