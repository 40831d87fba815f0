//! Classification of Jira's `400 Bad Request` bodies.
//!
//! Jira reports create failures as free text, either per field in `errors`
//! or globally in `errorMessages`. The creation ladders only need to know
//! *what kind* of problem it was and *which* fields were blamed.

use pipeline::{Rejection, RejectionKind};

use crate::wire::ErrorBody;

const ISSUE_TYPE_KEY: &str = "issuetype";

/// Turns a 400 response body into a [`Rejection`].
///
/// A body that is not Jira's error JSON is kept verbatim as an
/// [`RejectionKind::Other`] message.
pub fn classify_rejection(body: &str) -> Rejection {
    let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) else {
        return Rejection::new(RejectionKind::Other, Vec::new(), body.trim());
    };

    let fields: Vec<String> = parsed.errors.keys().cloned().collect();
    let mut messages: Vec<String> = parsed.error_messages.clone();
    messages.extend(
        parsed
            .errors
            .iter()
            .map(|(field, message)| format!("{field}: {message}")),
    );
    let message = messages.join("; ");

    let kind = classify(&parsed, &message);
    Rejection::new(kind, fields, message)
}

fn classify(parsed: &ErrorBody, message: &str) -> RejectionKind {
    let lower = message.to_ascii_lowercase();
    if parsed.errors.contains_key(ISSUE_TYPE_KEY) || lower.contains("issue type") {
        RejectionKind::InvalidIssueType
    } else if lower.contains("cannot be set")
        || lower.contains("not on the appropriate screen")
        || lower.contains("unknown")
    {
        RejectionKind::UnknownField
    } else if lower.contains("is required") {
        RejectionKind::MissingRequiredField
    } else {
        RejectionKind::Other
    }
}
