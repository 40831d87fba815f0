//! Issue creation with strategy ladders.
//!
//! Each `create_*` method walks the ladder from [`pipeline::strategy`] one
//! tracker call at a time and stops at the first success. Only a
//! [`TrackerError::Rejected`] moves the walk on; credential, transport and
//! malformed-response failures end it immediately, since no other request
//! shape would fix them.

use pipeline::strategy::{epic_ladder, story_ladder, subtask_attempt};
use pipeline::{
    Attempt, CreatedIssue, CreationError, Epic, FieldProvenance, IssueKey, IssueKind,
    IssueReceipt, IssueRequest, IssueTypeName, Rejection, RejectionKind, SchemaUpdate, Story,
    Subtask, TrackerError, TrackerSchema,
};
use tracing::{debug, info, instrument, warn};

use crate::session::TrackerSession;

/// Creates single issues against a [`TrackerSession`].
pub struct IssueCreator<'a> {
    session: &'a TrackerSession,
}

impl<'a> IssueCreator<'a> {
    pub fn new(session: &'a TrackerSession) -> Self {
        Self { session }
    }

    /// Creates an epic, trying Epic-Name variants until one is accepted.
    ///
    /// The ladder stops early on any rejection that is not about fields.
    #[instrument(skip(self, epic), fields(summary = %epic.summary))]
    pub async fn create_epic(&self, epic: &Epic) -> Result<CreatedIssue, CreationError> {
        let schema = self.session.schema().await;
        let settings = self.session.settings();
        let mut ladder = Ladder::default();

        for strategy in epic_ladder(&schema, &settings.epic_name_candidates) {
            let attempt = strategy.plan(epic, &settings.project_key, &schema);
            match ladder.send(self.session, &attempt).await {
                None => continue,
                Some(Ok(receipt)) => {
                    self.learn(&attempt);
                    return Ok(created(receipt, &epic.summary));
                }
                Some(Err(TrackerError::Rejected(rejection)))
                    if strategy.retry_warranted(&rejection) =>
                {
                    continue
                }
                Some(Err(_)) => break,
            }
        }

        Err(ladder.into_error(IssueKind::Epic, &epic.summary))
    }

    /// Creates a story, linked to `epic_key` when the schema has a link field.
    ///
    /// After a rejection, later rungs run only if their gate matches it: issue
    /// type alternates follow an invalid-type rejection, the priority-free
    /// retry follows a rejection that names priority, and the bare request is
    /// always the last resort. The fallback rungs reuse the last issue type
    /// the tracker did not refuse as invalid. A rung whose assumed Epic-Link
    /// field was refuted is re-sent once without it.
    #[instrument(skip(self, story), fields(summary = %story.summary, epic = ?epic_key))]
    pub async fn create_story(
        &self,
        story: &Story,
        epic_key: Option<&IssueKey>,
    ) -> Result<CreatedIssue, CreationError> {
        let mut schema = self.session.schema().await;
        let project = &self.session.settings().project_key;
        let mut ladder = Ladder::default();
        let mut last_rejection: Option<Rejection> = None;
        let mut proven_type: Option<IssueTypeName> = None;

        'ladder: for strategy in story_ladder(&schema) {
            if let Some(rejection) = &last_rejection {
                if !strategy.applies_after(rejection, story) {
                    continue;
                }
            }
            loop {
                let attempt =
                    strategy.plan(story, epic_key, proven_type.as_ref(), project, &schema);
                match ladder.send(self.session, &attempt).await {
                    None => break,
                    Some(Ok(receipt)) => {
                        self.learn(&attempt);
                        return Ok(created(receipt, &story.summary));
                    }
                    Some(Err(TrackerError::Rejected(rejection))) => {
                        if rejection.kind != RejectionKind::InvalidIssueType {
                            proven_type = Some(attempt.request.issue_type.clone());
                        }
                        let replan =
                            self.discard_refuted_link(&mut schema, &attempt.request, &rejection);
                        last_rejection = Some(rejection);
                        if !replan {
                            break;
                        }
                    }
                    Some(Err(_)) => break 'ladder,
                }
            }
        }

        Err(ladder.into_error(IssueKind::Story, &story.summary))
    }

    /// Creates a subtask under `story_key`. Single attempt.
    #[instrument(skip(self, subtask), fields(summary = %subtask.summary, story = %story_key))]
    pub async fn create_subtask(
        &self,
        subtask: &Subtask,
        story_key: &IssueKey,
    ) -> Result<CreatedIssue, CreationError> {
        let schema = self.session.schema().await;
        let attempt = subtask_attempt(
            subtask,
            story_key,
            &self.session.settings().project_key,
            &schema,
        );
        let mut ladder = Ladder::default();
        match ladder.send(self.session, &attempt).await {
            Some(Ok(receipt)) => Ok(created(receipt, &subtask.summary)),
            _ => Err(ladder.into_error(IssueKind::Subtask, &subtask.summary)),
        }
    }

    fn learn(&self, attempt: &Attempt) {
        if let Some(update) = &attempt.on_success {
            self.session.apply(update);
        }
    }

    /// Drops an assumed Epic-Link field once the tracker has blamed it.
    ///
    /// Returns `true` if the field was dropped.
    fn discard_refuted_link(
        &self,
        schema: &mut TrackerSchema,
        request: &IssueRequest,
        rejection: &Rejection,
    ) -> bool {
        let Some(link) = schema.epic_link_field.clone() else {
            return false;
        };
        if link.provenance != FieldProvenance::Assumed
            || request.field(link.id.as_str()).is_none()
            || !rejection.mentions_field(link.id.as_str())
        {
            return false;
        }
        warn!(field = %link.id, "assumed epic link field was refused; no longer sending it");
        let update = SchemaUpdate::EpicLinkDiscarded(link.id);
        schema.apply(&update);
        self.session.apply(&update);
        true
    }
}

/// Bookkeeping for one issue's walk down a ladder.
#[derive(Default)]
struct Ladder {
    sent: Vec<IssueRequest>,
    last_error: Option<TrackerError>,
}

impl Ladder {
    /// Sends `attempt` unless an identical request was already refused.
    ///
    /// Returns `None` for a skipped attempt.
    async fn send(
        &mut self,
        session: &TrackerSession,
        attempt: &Attempt,
    ) -> Option<Result<IssueReceipt, TrackerError>> {
        if self.sent.contains(&attempt.request) {
            debug!(strategy = %attempt.label, "skipping duplicate request");
            return None;
        }
        self.sent.push(attempt.request.clone());

        let outcome = session.tracker().create_issue(&attempt.request).await;
        match &outcome {
            Ok(receipt) => info!(
                strategy = %attempt.label,
                key = %receipt.key,
                issue_type = %attempt.request.issue_type,
                "issue created"
            ),
            Err(error) => {
                warn!(
                    strategy = %attempt.label,
                    issue_type = %attempt.request.issue_type,
                    %error,
                    "create attempt failed"
                );
                self.last_error = Some(error.clone());
            }
        }
        Some(outcome)
    }

    fn into_error(self, kind: IssueKind, summary: &str) -> CreationError {
        let attempts = self.sent.len();
        let reason = self.last_error.unwrap_or_else(|| TrackerError::InvalidResponse {
            message: "no creation strategy was attempted".to_string(),
        });
        CreationError {
            kind,
            summary: summary.to_string(),
            reason,
            attempts,
        }
    }
}

fn created(receipt: IssueReceipt, summary: &str) -> CreatedIssue {
    CreatedIssue {
        key: receipt.key,
        self_reference: receipt.self_url,
        summary: summary.to_string(),
    }
}
