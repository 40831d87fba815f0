//! Ticketforge orchestration: from requirements to tracker issues.
//!
//! This crate drives the model analysis, discovers the tracker schema, walks
//! the requirements hierarchy, and creates each issue through the strategy
//! ladders defined in [`pipeline::strategy`].
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** Code here sequences calls between business logic
//! in the [`pipeline`] crate and the infrastructure ports (`IssueTracker`,
//! `LlmProvider`). It contains no tracker- or model-specific rules of its own.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`session`] | `TrackerSession`: connection plus cached schema |
//! | [`discovery`] | `SchemaDiscoverer`: best-effort schema probing |
//! | [`creator`] | `IssueCreator`: per-issue strategy ladders |
//! | [`orchestrator`] | `HierarchyOrchestrator`: depth-first walk with cancellation |
//! | [`analysis`] | `Analyzer`: prompt, model call, extraction |
//! | [`service`] | `TicketService` and `TicketReport` |

pub mod analysis;
pub mod creator;
pub mod discovery;
pub mod orchestrator;
pub mod service;
pub mod session;

pub use analysis::{Analysis, Analyzer};
pub use creator::IssueCreator;
pub use discovery::SchemaDiscoverer;
pub use orchestrator::{HierarchyOrchestrator, CANCELLED_MESSAGE};
pub use service::{CreatedIssues, TicketReport, TicketService};
pub use session::TrackerSession;
