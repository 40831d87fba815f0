//! Port traits implemented by infrastructure crates.
//!
//! The `jira` crate implements [`IssueTracker`]; the `llm` crate implements
//! [`LlmProvider`]. Orchestration code depends only on these traits, which is
//! also what makes it testable with in-memory fakes.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    FieldDefinition, ImagePayload, IssueKey, IssueTypeMeta, IssueTypeName, LlmError, ProjectKey,
    TrackerError,
};

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

/// A single create call, in tracker-neutral form.
///
/// `fields` holds every attribute beyond the four core ones, keyed by field
/// identifier (`"priority"`, `"parent"`, `"customfield_10011"`, ...). A
/// `BTreeMap` keeps request bodies deterministic, which the creator relies on
/// to skip strategies that would resend an identical request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueRequest {
    /// Target project.
    pub project: ProjectKey,
    /// One-line title.
    pub summary: String,
    /// Body text.
    pub description: String,
    /// Issue type to create.
    pub issue_type: IssueTypeName,
    /// Additional fields by identifier.
    pub fields: BTreeMap<String, Value>,
}

impl IssueRequest {
    /// A request carrying only the core fields.
    pub fn new(
        project: ProjectKey,
        summary: impl Into<String>,
        description: impl Into<String>,
        issue_type: IssueTypeName,
    ) -> Self {
        Self {
            project,
            summary: summary.into(),
            description: description.into(),
            issue_type,
            fields: BTreeMap::new(),
        }
    }

    /// Adds (or replaces) an additional field.
    #[must_use]
    pub fn with_field(mut self, id: impl Into<String>, value: Value) -> Self {
        self.fields.insert(id.into(), value);
        self
    }

    /// The value sent for `id`, if any.
    pub fn field(&self, id: &str) -> Option<&Value> {
        self.fields.get(id)
    }
}

/// What the tracker returns for an accepted create call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueReceipt {
    /// Tracker-assigned key.
    pub key: IssueKey,
    /// Locator URL.
    pub self_url: String,
}

/// The external project-tracking system.
///
/// Implementations perform exactly one network call per method invocation and
/// never retry on their own: retry decisions belong to the creation strategies.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Creates one issue.
    async fn create_issue(&self, request: &IssueRequest) -> Result<IssueReceipt, TrackerError>;

    /// Lists every field definition the tracker knows about.
    async fn list_fields(&self) -> Result<Vec<FieldDefinition>, TrackerError>;

    /// Create metadata for `project`, optionally scoped to one issue type.
    ///
    /// Unscoped, the result lists every creatable issue type in the project.
    async fn create_metadata(
        &self,
        project: &ProjectKey,
        issue_type: Option<&IssueTypeName>,
    ) -> Result<Vec<IssueTypeMeta>, TrackerError>;
}

// ---------------------------------------------------------------------------
// Generative model
// ---------------------------------------------------------------------------

/// A generative model that turns a prompt (plus optional images) into text.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Sends one generation request and returns the raw response text.
    async fn generate(&self, prompt: &str, images: &[ImagePayload]) -> Result<String, LlmError>;

    /// Model identifier, for logging.
    fn model_name(&self) -> &str;
}
