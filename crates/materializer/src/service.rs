//! Request-level entry points and the caller-facing report.

use std::sync::Arc;

use pipeline::{
    CreatedIssue, CreationResult, CreationStatus, PipelineError, RequirementsDocument,
    RequirementsInput, RunId, Timestamp,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::analysis::Analyzer;
use crate::orchestrator::HierarchyOrchestrator;
use crate::session::TrackerSession;

/// Issues created by a run, grouped by level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CreatedIssues {
    pub epics: Vec<CreatedIssue>,
    pub stories: Vec<CreatedIssue>,
    pub subtasks: Vec<CreatedIssue>,
}

/// Outcome of one ticket-creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketReport {
    pub run_id: RunId,
    pub status: CreationStatus,
    pub message: String,
    pub created_issues: CreatedIssues,
    pub errors: Vec<String>,
    pub omitted: usize,
    pub started_at: Timestamp,
    pub finished_at: Timestamp,
}

impl TicketReport {
    /// Wraps a finished run.
    pub fn from_result(run_id: RunId, result: CreationResult, started_at: Timestamp) -> Self {
        let status = result.status();
        let (epics, stories, subtasks) = (
            result.epics.len(),
            result.stories.len(),
            result.subtasks.len(),
        );
        let message = match status {
            CreationStatus::Succeeded => format!(
                "Successfully created {epics} epics, {stories} stories, and {subtasks} subtasks"
            ),
            _ => format!(
                "Created {epics} epics, {stories} stories, {subtasks} subtasks. Some issues had errors."
            ),
        };
        Self {
            run_id,
            status,
            message,
            created_issues: CreatedIssues {
                epics: result.epics,
                stories: result.stories,
                subtasks: result.subtasks,
            },
            errors: result.errors,
            omitted: result.omitted,
            started_at,
            finished_at: Timestamp::now(),
        }
    }

    /// A report for a request refused because the tracker is not configured.
    pub fn not_configured(reason: &str) -> Self {
        let now = Timestamp::now();
        Self {
            run_id: RunId::new_random(),
            status: CreationStatus::NotConfigured,
            message: format!("Tracker is not configured: {reason}"),
            created_issues: CreatedIssues::default(),
            errors: Vec::new(),
            omitted: 0,
            started_at: now,
            finished_at: now,
        }
    }
}

/// Ticket creation for one tracker connection.
///
/// Built either around a live session or, when tracker configuration was
/// rejected, around the reason. The latter answers every request with a
/// `NotConfigured` report without touching the network.
pub struct TicketService {
    tracker: Result<HierarchyOrchestrator, String>,
}

impl TicketService {
    pub fn new(session: Arc<TrackerSession>) -> Self {
        Self {
            tracker: Ok(HierarchyOrchestrator::new(session)),
        }
    }

    /// A service whose tracker configuration was rejected.
    pub fn not_configured(reason: impl Into<String>) -> Self {
        Self {
            tracker: Err(reason.into()),
        }
    }

    /// Builds the service from the outcome of configuration validation.
    pub fn from_configuration(session: Result<Arc<TrackerSession>, PipelineError>) -> Self {
        match session {
            Ok(session) => Self::new(session),
            Err(PipelineError::Configuration { message }) => Self::not_configured(message),
            Err(other) => Self::not_configured(other.to_string()),
        }
    }

    /// Materializes an already-parsed document.
    pub async fn create_from_document(
        &self,
        document: &RequirementsDocument,
        cancel: &CancellationToken,
    ) -> TicketReport {
        let orchestrator = match &self.tracker {
            Ok(orchestrator) => orchestrator,
            Err(reason) => {
                warn!(%reason, "ticket creation refused: tracker not configured");
                return TicketReport::not_configured(reason);
            }
        };
        let run_id = RunId::new_random();
        let started_at = Timestamp::now();
        let result = orchestrator
            .materialize_run(run_id, document, cancel)
            .await;
        TicketReport::from_result(run_id, result, started_at)
    }

    /// Analyses `input` with the model, then materializes the result.
    ///
    /// Tracker configuration is checked before the model is called, and the
    /// cancellation token on both sides of the model call.
    #[instrument(skip_all, fields(images = input.images.len()))]
    pub async fn create_from_requirements(
        &self,
        analyzer: &Analyzer,
        input: &RequirementsInput,
        custom_prompt: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<TicketReport, PipelineError> {
        if let Err(reason) = &self.tracker {
            warn!(%reason, "ticket creation refused: tracker not configured");
            return Ok(TicketReport::not_configured(reason));
        }

        if cancel.is_cancelled() {
            return Err(cancelled("before AI analysis"));
        }
        let analysis = analyzer.analyze(input, custom_prompt).await?;
        if cancel.is_cancelled() {
            return Err(cancelled("after AI analysis"));
        }

        info!(
            epics = analysis.stats.epics,
            stories = analysis.stats.stories,
            subtasks = analysis.stats.subtasks,
            "creating tickets from analysis"
        );
        Ok(self.create_from_document(&analysis.document, cancel).await)
    }

    /// The tracker session, if configured.
    pub fn session(&self) -> Option<&Arc<TrackerSession>> {
        self.tracker.as_ref().ok().map(HierarchyOrchestrator::session)
    }

    /// Why the tracker is not configured, if it is not.
    pub fn configuration_error(&self) -> Option<&str> {
        self.tracker.as_ref().err().map(String::as_str)
    }
}

fn cancelled(stage: &str) -> PipelineError {
    warn!(stage, "request cancelled by client");
    PipelineError::Cancelled {
        stage: stage.to_string(),
    }
}
