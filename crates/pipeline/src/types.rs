//! Shared value types for the ticketforge domain.
//!
//! Covers the work-breakdown document produced by the model
//! ([`RequirementsDocument`] → [`Epic`] → [`Story`] → [`Subtask`]), the
//! inputs handed to the model ([`RequirementsInput`], [`ImagePayload`]), and
//! the records produced while materializing issues ([`CreatedIssue`],
//! [`CreationResult`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::IssueKey;

// ---------------------------------------------------------------------------
// Work-breakdown document
// ---------------------------------------------------------------------------

/// Functional classification of an [`Epic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Category {
    /// Behaviour the system must provide.
    #[serde(rename = "FUNCTIONAL")]
    Functional,
    /// Quality attributes (performance, security, ...).
    #[serde(rename = "NON-FUNCTIONAL")]
    NonFunctional,
    /// The model did not say, or said something unrecognisable.
    #[default]
    #[serde(rename = "UNSPECIFIED")]
    Unspecified,
}

impl Category {
    /// Parses a category label leniently.
    ///
    /// Accepts `FUNCTIONAL`, `NON-FUNCTIONAL`, `NON_FUNCTIONAL` and
    /// `NON FUNCTIONAL` in any case. Anything else is [`Category::Unspecified`].
    pub fn parse_lenient(raw: &str) -> Self {
        let normalised: String = raw
            .trim()
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_ascii_uppercase();
        match normalised.as_str() {
            "FUNCTIONAL" => Self::Functional,
            "NONFUNCTIONAL" => Self::NonFunctional,
            _ => Self::Unspecified,
        }
    }

    /// Returns `true` unless this is [`Category::Unspecified`].
    pub fn is_specified(self) -> bool {
        self != Self::Unspecified
    }
}

/// Priority of a [`Story`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Priority {
    /// Tracker priority `High`.
    High,
    /// Tracker priority `Medium`.
    Medium,
    /// Tracker priority `Low`.
    Low,
    /// No priority given; the tracker's default applies.
    #[default]
    Unspecified,
}

impl Priority {
    /// Parses a priority label case-insensitively.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "high" => Self::High,
            "medium" => Self::Medium,
            "low" => Self::Low,
            _ => Self::Unspecified,
        }
    }

    /// The tracker-side priority name, or `None` when unspecified.
    pub fn tracker_name(self) -> Option<&'static str> {
        match self {
            Self::High => Some("High"),
            Self::Medium => Some("Medium"),
            Self::Low => Some("Low"),
            Self::Unspecified => None,
        }
    }
}

/// The bottom level of the hierarchy. Always parented to a [`Story`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subtask {
    /// Non-empty one-line title.
    pub summary: String,
    /// Free-form body; may be empty.
    #[serde(default)]
    pub description: String,
    /// Display label from the source document (`subtaskNumber`).
    #[serde(rename = "subtaskNumber", default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
}

/// The middle level of the hierarchy, optionally linked to an [`Epic`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    /// Non-empty one-line title.
    pub summary: String,
    /// Free-form body; may be empty.
    #[serde(default)]
    pub description: String,
    /// Requested priority.
    #[serde(default)]
    pub priority: Priority,
    /// Display label from the source document (`storyNumber`).
    #[serde(rename = "storyNumber", default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    /// Child subtasks, in document order.
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
}

/// The top level of the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Epic {
    /// Non-empty one-line title. Also used as the Epic-Name value.
    pub summary: String,
    /// Free-form body; may be empty.
    #[serde(default)]
    pub description: String,
    /// Functional classification.
    #[serde(default)]
    pub category: Category,
    /// Display label from the source document (`epicNumber`).
    #[serde(rename = "epicNumber", default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    /// Child stories, in document order.
    #[serde(default)]
    pub stories: Vec<Story>,
}

/// The structured work breakdown extracted from one model response.
///
/// Immutable after parsing; see [`crate::extraction::extract_document`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RequirementsDocument {
    /// Epics in document order.
    pub epics: Vec<Epic>,
}

impl RequirementsDocument {
    /// Counts the items at every level of the hierarchy.
    pub fn stats(&self) -> DocumentStats {
        let stories = self.epics.iter().map(|e| e.stories.len()).sum();
        let subtasks = self
            .epics
            .iter()
            .flat_map(|e| &e.stories)
            .map(|s| s.subtasks.len())
            .sum();
        DocumentStats {
            epics: self.epics.len(),
            stories,
            subtasks,
            images_processed: 0,
        }
    }
}

/// Item counts for a [`RequirementsDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentStats {
    /// Number of epics.
    pub epics: usize,
    /// Number of stories across all epics.
    pub stories: usize,
    /// Number of subtasks across all stories.
    pub subtasks: usize,
    /// Number of images sent to the model alongside the text.
    pub images_processed: usize,
}

// ---------------------------------------------------------------------------
// Model input
// ---------------------------------------------------------------------------

/// An image handed to the model, tagged with its MIME type.
#[derive(Clone, PartialEq, Eq)]
pub struct ImagePayload {
    /// Raw image bytes.
    pub bytes: Vec<u8>,
    /// MIME type, e.g. `"image/png"`.
    pub mime_type: String,
}

impl std::fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImagePayload")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Everything the caller supplies for one analysis request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequirementsInput {
    /// Concatenated requirements text; may be empty when only images are given.
    pub text: String,
    /// Architecture diagrams and other images.
    pub images: Vec<ImagePayload>,
}

impl RequirementsInput {
    /// Returns `true` if there is neither text nor an image to analyse.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.images.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Creation records
// ---------------------------------------------------------------------------

/// An issue the tracker accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedIssue {
    /// Tracker-assigned key.
    pub key: IssueKey,
    /// Locator URL returned by the tracker.
    #[serde(rename = "self")]
    pub self_reference: String,
    /// Echo of the input summary.
    pub summary: String,
}

/// Everything a materialization run produced.
///
/// Accumulated by the orchestrator and never mutated after it is returned.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CreationResult {
    /// Created epics, in document order.
    pub epics: Vec<CreatedIssue>,
    /// Created stories, in document order.
    pub stories: Vec<CreatedIssue>,
    /// Created subtasks, in document order.
    pub subtasks: Vec<CreatedIssue>,
    /// Human-readable per-item failures and, at most once, the cancellation notice.
    pub errors: Vec<String>,
    /// Descendants skipped because their parent could not be created.
    pub omitted: usize,
}

impl CreationResult {
    /// Total number of created issues across all levels.
    pub fn created_count(&self) -> usize {
        self.epics.len() + self.stories.len() + self.subtasks.len()
    }

    /// Classifies the result for the caller.
    pub fn status(&self) -> CreationStatus {
        if self.errors.is_empty() {
            CreationStatus::Succeeded
        } else {
            CreationStatus::PartiallySucceeded
        }
    }
}

/// Caller-visible outcome of a ticket-creation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreationStatus {
    /// Every item was created.
    Succeeded,
    /// Some items failed or the run was cancelled; see the error list.
    PartiallySucceeded,
    /// Tracker credentials were absent or invalid; nothing was attempted.
    NotConfigured,
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}
