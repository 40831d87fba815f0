//! Core domain for the ticket materialization pipeline.
//!
//! This crate contains the requirements hierarchy, newtype identifiers, the
//! tracker schema model, the issue-creation strategies, and every error type
//! shared by the pipeline. Infrastructure crates implement the port traits
//! defined here; they never add domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; infrastructure crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`ProjectKey`, `IssueKey`, `FieldId`, `RunId`, etc.) |
//! | [`types`] | Requirements hierarchy and creation results (`Epic`, `CreationResult`, etc.) |
//! | [`errors`] | Error taxonomy and retry policy |
//! | [`extraction`] | Lenient recovery of a [`RequirementsDocument`] from model output |
//! | [`prompt`] | Prompt assembly |
//! | [`schema`] | Tracker settings, resolved schema and discovery heuristics |
//! | [`strategy`] | Epic, story and subtask creation ladders |
//! | [`ports`] | `IssueTracker` and `LlmProvider` traits |

pub mod errors;
pub mod extraction;
pub mod identifiers;
pub mod ports;
pub mod prompt;
pub mod schema;
pub mod strategy;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use errors::{
    CreationError, IssueKind, LlmError, ParseError, PipelineError, Rejection, RejectionKind,
    ResponsePreview, RetryPolicy, TrackerError,
};
pub use extraction::{extract_document, locate_json_object};
pub use identifiers::{FieldId, IssueKey, IssueTypeName, ProjectKey, RunId};
pub use ports::{IssueReceipt, IssueRequest, IssueTracker, LlmProvider};
pub use prompt::{build_prompt, DEFAULT_EXTRACTION_PROMPT};
pub use schema::{
    EpicLinkField, FieldDefinition, FieldProvenance, IssueTypeInfo, IssueTypeMeta,
    LearnedEpicName, SchemaUpdate, TrackerSchema, TrackerSettings,
};
pub use strategy::{Attempt, EpicStrategy, StoryStrategy};
pub use types::{
    Category, CreatedIssue, CreationResult, CreationStatus, DocumentStats, Epic, ImagePayload,
    Priority, RequirementsDocument, RequirementsInput, Story, Subtask, Timestamp,
};
