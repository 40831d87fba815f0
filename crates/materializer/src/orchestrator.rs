//! Depth-first materialization of a requirements hierarchy.

use std::sync::Arc;

use pipeline::{CreationError, CreationResult, IssueKey, RequirementsDocument, RunId};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::creator::IssueCreator;
use crate::session::TrackerSession;

/// Error line recorded when the caller cancels a run.
pub const CANCELLED_MESSAGE: &str = "Ticket creation was cancelled by client";

/// Walks a [`RequirementsDocument`] and creates every issue in it.
///
/// Creation is strictly sequential: a parent is always created before its
/// children, and siblings follow document order. A failed item aborts only its
/// own subtree. Cancellation is polled before every create call and halts the
/// whole walk; issues created so far are kept.
#[derive(Debug, Clone)]
pub struct HierarchyOrchestrator {
    session: Arc<TrackerSession>,
}

impl HierarchyOrchestrator {
    pub fn new(session: Arc<TrackerSession>) -> Self {
        Self { session }
    }

    /// The tracker session issues are created through.
    pub fn session(&self) -> &Arc<TrackerSession> {
        &self.session
    }

    /// Materializes `document` under a fresh [`RunId`].
    pub async fn materialize(
        &self,
        document: &RequirementsDocument,
        cancel: &CancellationToken,
    ) -> CreationResult {
        self.materialize_run(RunId::new_random(), document, cancel)
            .await
    }

    /// Materializes `document`, recording `run_id` on the run's span.
    #[instrument(skip(self, document, cancel), fields(%run_id, epics = document.epics.len()))]
    pub async fn materialize_run(
        &self,
        run_id: RunId,
        document: &RequirementsDocument,
        cancel: &CancellationToken,
    ) -> CreationResult {
        let creator = IssueCreator::new(&self.session);
        let mut result = CreationResult::default();

        'epics: for epic in &document.epics {
            if halted(cancel, &mut result) {
                break;
            }
            let epic_key = match creator.create_epic(epic).await {
                Ok(issue) => {
                    let key = issue.key.clone();
                    result.epics.push(issue);
                    key
                }
                Err(error) => {
                    let skipped = epic.stories.len()
                        + epic.stories.iter().map(|s| s.subtasks.len()).sum::<usize>();
                    record_failure(&mut result, error, skipped);
                    continue;
                }
            };

            for story in &epic.stories {
                if halted(cancel, &mut result) {
                    break 'epics;
                }
                let story_key: IssueKey = match creator.create_story(story, Some(&epic_key)).await
                {
                    Ok(issue) => {
                        let key = issue.key.clone();
                        result.stories.push(issue);
                        key
                    }
                    Err(error) => {
                        record_failure(&mut result, error, story.subtasks.len());
                        continue;
                    }
                };

                for subtask in &story.subtasks {
                    if halted(cancel, &mut result) {
                        break 'epics;
                    }
                    match creator.create_subtask(subtask, &story_key).await {
                        Ok(issue) => result.subtasks.push(issue),
                        Err(error) => record_failure(&mut result, error, 0),
                    }
                }
            }
        }

        info!(
            epics = result.epics.len(),
            stories = result.stories.len(),
            subtasks = result.subtasks.len(),
            errors = result.errors.len(),
            omitted = result.omitted,
            "materialization finished"
        );
        result
    }
}

fn halted(cancel: &CancellationToken, result: &mut CreationResult) -> bool {
    if !cancel.is_cancelled() {
        return false;
    }
    warn!(
        created = result.created_count(),
        "cancellation requested; stopping before the next create call"
    );
    result.errors.push(CANCELLED_MESSAGE.to_string());
    true
}

fn record_failure(result: &mut CreationResult, error: CreationError, skipped_descendants: usize) {
    warn!(
        kind = %error.kind,
        summary = %error.summary,
        attempts = error.attempts,
        skipped_descendants,
        reason = %error.reason,
        "issue could not be created"
    );
    result.errors.push(error.to_string());
    result.omitted += skipped_descendants;
}
