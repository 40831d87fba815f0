//! Error taxonomy and retry-policy types for the ticketforge domain.
//!
//! [`PipelineError`] covers the conditions that abort a whole request: a model
//! response that cannot be parsed, a tracker that is not configured, a model
//! call that failed outright, or a client that went away. Everything that can
//! go wrong for a *single* issue is a [`CreationError`], which the
//! orchestrator records and moves past.
//!
//! Port-level errors ([`TrackerError`], [`LlmError`]) are produced by the
//! infrastructure adapters and consumed by the orchestration layer; they never
//! reach the caller directly.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// Returned by [`LlmError::retry_policy`] so the model adapter can decide
/// whether to re-send a request. Tracker calls are never retried at the
/// transport level: each creation strategy step is exactly one call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    Retryable {
        /// Minimum back-off before the next attempt. `None` means apply the
        /// caller's own back-off schedule.
        after: Option<Duration>,
    },
    /// The operation must not be retried.
    NonRetryable,
}

// ---------------------------------------------------------------------------
// Request-level errors
// ---------------------------------------------------------------------------

/// Errors that abort a whole analysis or ticket-creation request.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The model response did not contain a usable document.
    #[error("failed to parse AI response: {0}")]
    Parse(#[from] ParseError),

    /// Tracker (or model) credentials are absent or invalid.
    ///
    /// Detected before any network call is made.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// The model call itself failed, so there is nothing to parse.
    #[error("AI analysis failed: {0}")]
    Generation(#[from] LlmError),

    /// The client went away before the request finished.
    #[error("request cancelled by client {stage}")]
    Cancelled {
        /// Where the cancellation was observed, e.g. `"before AI analysis"`.
        stage: String,
    },

    /// Neither requirements text nor any image was supplied.
    #[error("no requirements found: supply at least one text file or image")]
    NoRequirements,
}

impl PipelineError {
    /// Shorthand for [`PipelineError::Configuration`].
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse errors
// ---------------------------------------------------------------------------

/// Bounded excerpt of a raw model response, kept for diagnostics.
///
/// Never holds the whole response: model output can be arbitrarily large.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponsePreview {
    /// Leading characters of the response.
    pub head: String,
    /// Trailing characters of the response; empty when `head` covers everything.
    pub tail: String,
    /// Length of the full response in characters.
    pub total_chars: usize,
}

impl ResponsePreview {
    /// Characters kept at each end of the response.
    pub const EDGE_CHARS: usize = 500;

    /// Builds a preview of `raw`, cutting on character boundaries.
    pub fn of(raw: &str) -> Self {
        let total_chars = raw.chars().count();
        if total_chars <= Self::EDGE_CHARS * 2 {
            return Self {
                head: raw.to_string(),
                tail: String::new(),
                total_chars,
            };
        }
        let head = raw.chars().take(Self::EDGE_CHARS).collect();
        let tail = raw.chars().skip(total_chars - Self::EDGE_CHARS).collect();
        Self {
            head,
            tail,
            total_chars,
        }
    }
}

impl std::fmt::Display for ResponsePreview {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.tail.is_empty() {
            write!(f, "{:?}", self.head)
        } else {
            write!(
                f,
                "{:?} ... {:?} ({} chars)",
                self.head, self.tail, self.total_chars
            )
        }
    }
}

/// The model response could not be turned into a requirements document.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseError {
    /// No JSON object could be recovered by any extraction strategy.
    #[error("AI response was not valid JSON")]
    InvalidJson {
        /// Bounded excerpt of the offending response.
        preview: ResponsePreview,
    },

    /// A JSON object was found but has no `epics` sequence.
    #[error("AI response has no `epics` array")]
    MissingEpics {
        /// Bounded excerpt of the offending response.
        preview: ResponsePreview,
    },
}

impl ParseError {
    /// The diagnostic excerpt carried by this error.
    pub fn preview(&self) -> &ResponsePreview {
        match self {
            Self::InvalidJson { preview } | Self::MissingEpics { preview } => preview,
        }
    }
}

// ---------------------------------------------------------------------------
// Model port errors
// ---------------------------------------------------------------------------

/// Failure of a call to the generative model.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LlmError {
    /// The request never produced an HTTP response (connect failure, timeout).
    #[error("model request failed: {message}")]
    Transport {
        /// Underlying client error text.
        message: String,
        /// Whether the failure happened before the request was sent.
        connect_or_timeout: bool,
    },

    /// The model API answered with a non-success status.
    #[error("model API error {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body or error description.
        message: String,
        /// Server-provided `Retry-After`, if any.
        retry_after: Option<Duration>,
    },

    /// The API answered successfully but with no text to parse.
    #[error("model returned an empty response")]
    EmptyResponse,

    /// The response body could not be decoded.
    #[error("could not decode model response: {message}")]
    InvalidResponse {
        /// Decoder error text.
        message: String,
    },
}

impl LlmError {
    /// Whether re-sending the same request could succeed.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::Transport {
                connect_or_timeout: true,
                ..
            } => RetryPolicy::Retryable { after: None },
            Self::Api {
                status,
                retry_after,
                ..
            } if *status == 429 || (500..600).contains(status) => RetryPolicy::Retryable {
                after: *retry_after,
            },
            _ => RetryPolicy::NonRetryable,
        }
    }
}

// ---------------------------------------------------------------------------
// Tracker port errors
// ---------------------------------------------------------------------------

/// Why the tracker refused a create request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    /// A field identifier is unknown or cannot be set on this issue type/screen.
    UnknownField,
    /// The issue type does not exist in (or is not creatable for) the project.
    InvalidIssueType,
    /// A field the tracker requires was not supplied.
    MissingRequiredField,
    /// Anything else (bad value, permissions, workflow rule, ...).
    Other,
}

/// A structured create-request rejection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    /// Classification of the rejection.
    pub kind: RejectionKind,
    /// Field identifiers the tracker blamed, as spelled by the tracker.
    pub fields: Vec<String>,
    /// Tracker-provided message(s), joined.
    pub message: String,
}

impl Rejection {
    /// Creates a rejection.
    pub fn new(kind: RejectionKind, fields: Vec<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            fields,
            message: message.into(),
        }
    }

    /// `true` for rejections caused by which fields were (not) sent.
    pub fn is_field_related(&self) -> bool {
        matches!(
            self.kind,
            RejectionKind::UnknownField | RejectionKind::MissingRequiredField
        )
    }

    /// `true` if the tracker blamed `field` (case-insensitive), either in the
    /// structured field list or by name in the message.
    ///
    /// A name in the message only counts as a whole identifier, so
    /// `customfield_1001` is not found inside `customfield_10011`.
    pub fn mentions_field(&self, field: &str) -> bool {
        if self.fields.iter().any(|f| f.eq_ignore_ascii_case(field)) {
            return true;
        }
        let needle = field.to_ascii_lowercase();
        if needle.is_empty() {
            return false;
        }
        let message = self.message.to_ascii_lowercase();
        message.match_indices(&needle).any(|(start, _)| {
            let before = message[..start].chars().next_back();
            let after = message[start + needle.len()..].chars().next();
            !before.is_some_and(is_identifier_char) && !after.is_some_and(is_identifier_char)
        })
    }
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.fields.is_empty() {
            write!(f, "{:?}: {}", self.kind, self.message)
        } else {
            write!(
                f,
                "{:?} [{}]: {}",
                self.kind,
                self.fields.join(", "),
                self.message
            )
        }
    }
}

/// Failure of a call to the issue tracker.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TrackerError {
    /// The tracker understood the request and refused it.
    #[error("tracker rejected the request: {0}")]
    Rejected(Rejection),

    /// Credentials were refused.
    #[error("tracker refused credentials (HTTP {status})")]
    Unauthorized {
        /// 401 or 403.
        status: u16,
    },

    /// Any other non-success HTTP status.
    #[error("tracker returned HTTP {status}: {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body excerpt.
        message: String,
    },

    /// No HTTP response (DNS, connect, TLS, timeout).
    #[error("tracker request failed: {message}")]
    Transport {
        /// Underlying client error text.
        message: String,
    },

    /// A success response whose body could not be decoded.
    #[error("unexpected tracker response: {message}")]
    InvalidResponse {
        /// Decoder error text.
        message: String,
    },
}

impl TrackerError {
    /// The rejection, if the tracker refused the request on its merits.
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Rejected(rejection) => Some(rejection),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Per-issue errors
// ---------------------------------------------------------------------------

/// Level of the hierarchy an issue belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Top level.
    Epic,
    /// Middle level.
    Story,
    /// Bottom level.
    Subtask,
}

impl std::fmt::Display for IssueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Epic => "epic",
            Self::Story => "story",
            Self::Subtask => "subtask",
        };
        f.write_str(label)
    }
}

/// A single issue could not be created after every applicable strategy.
///
/// Always recoverable at the orchestrator level: recorded, never fatal.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Failed to create {kind}: {summary} ({reason})")]
pub struct CreationError {
    /// Which level the issue belonged to.
    pub kind: IssueKind,
    /// Summary of the item that failed.
    pub summary: String,
    /// Error from the last attempt made.
    pub reason: TrackerError,
    /// Number of tracker calls spent on this issue.
    pub attempts: usize,
}
