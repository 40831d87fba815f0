//! Per-connection tracker session and its schema cache.

use std::sync::Arc;

use parking_lot::RwLock;
use pipeline::{IssueTracker, SchemaUpdate, TrackerSchema, TrackerSettings};
use tracing::{debug, info};

use crate::discovery::SchemaDiscoverer;

/// A live tracker connection plus the schema resolved against it.
///
/// The schema is discovered lazily on first use and cached for the lifetime
/// of the session. Afterwards it only changes through [`SchemaUpdate`]s that
/// the creator learns from create calls.
///
/// Lock guards are held only to clone or replace the schema, never across an
/// `.await`. Two first uses racing each other may both run discovery; the
/// first result stored wins and the other is dropped.
pub struct TrackerSession {
    tracker: Arc<dyn IssueTracker>,
    settings: TrackerSettings,
    schema: RwLock<Option<TrackerSchema>>,
}

impl TrackerSession {
    /// Creates a session with an empty schema cache.
    pub fn new(tracker: Arc<dyn IssueTracker>, settings: TrackerSettings) -> Self {
        Self {
            tracker,
            settings,
            schema: RwLock::new(None),
        }
    }

    /// The tracker port.
    pub fn tracker(&self) -> &dyn IssueTracker {
        self.tracker.as_ref()
    }

    /// Operator configuration this session was opened with.
    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    /// The cached schema, discovering it on first call.
    pub async fn schema(&self) -> TrackerSchema {
        let cached = self.schema.read().clone();
        if let Some(schema) = cached {
            return schema;
        }

        let discovered = SchemaDiscoverer::new(self.tracker.as_ref(), &self.settings)
            .discover()
            .await;

        let mut slot = self.schema.write();
        match slot.as_ref() {
            Some(existing) => {
                debug!("schema already cached by a concurrent request; discarding duplicate");
                existing.clone()
            }
            None => {
                *slot = Some(discovered.clone());
                discovered
            }
        }
    }

    /// The cached schema, or `None` before the first discovery.
    pub fn cached_schema(&self) -> Option<TrackerSchema> {
        self.schema.read().clone()
    }

    /// Records a learned update. A no-op before the schema is discovered.
    pub fn apply(&self, update: &SchemaUpdate) {
        let mut slot = self.schema.write();
        if let Some(schema) = slot.as_mut() {
            info!(?update, "updating cached tracker schema");
            schema.apply(update);
        }
    }
}

impl std::fmt::Debug for TrackerSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerSession")
            .field("project", &self.settings.project_key)
            .field("schema_cached", &self.schema.read().is_some())
            .finish()
    }
}
