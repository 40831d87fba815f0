//! Schema discovery against a live tracker.
//!
//! Every lookup here is best effort. A failed call is logged and treated as
//! "not found"; discovery itself cannot fail, and a schema built from
//! configuration alone is a legal result.

use pipeline::schema::{
    find_epic_link_field, find_epic_name_field, resolve_epic_type, resolve_story_type,
    resolve_subtask_type,
};
use pipeline::{
    EpicLinkField, FieldDefinition, FieldId, FieldProvenance, IssueTracker, IssueTypeInfo,
    IssueTypeName, TrackerSchema, TrackerSettings,
};
use tracing::{debug, info, instrument, warn};

/// Resolves a [`TrackerSchema`] for one project.
pub struct SchemaDiscoverer<'a> {
    tracker: &'a dyn IssueTracker,
    settings: &'a TrackerSettings,
}

impl<'a> SchemaDiscoverer<'a> {
    pub fn new(tracker: &'a dyn IssueTracker, settings: &'a TrackerSettings) -> Self {
        Self { tracker, settings }
    }

    /// Runs every discovery step and assembles the schema.
    #[instrument(skip(self), fields(project = %self.settings.project_key))]
    pub async fn discover(&self) -> TrackerSchema {
        let mut schema = TrackerSchema::from_settings(self.settings);

        let available = self.available_issue_types().await;
        schema.epic_issue_type = resolve_epic_type(&available, &self.settings.epic_issue_type);
        schema.story_issue_type = resolve_story_type(&available, &self.settings.story_issue_type);
        schema.subtask_issue_type =
            resolve_subtask_type(&available, &self.settings.subtask_issue_type);
        schema.available_issue_types = available;

        // The global list feeds both field searches; fetch it at most once.
        let needs_global =
            self.settings.epic_name_field.is_none() || self.settings.epic_link_field.is_none();
        let global_fields = if needs_global {
            self.global_fields().await
        } else {
            Vec::new()
        };

        schema.epic_name_field = match &self.settings.epic_name_field {
            Some(id) => {
                debug!(field = %id, "using configured epic name field");
                Some(id.clone())
            }
            None => {
                self.discover_epic_name(&global_fields, &schema.epic_issue_type)
                    .await
            }
        };

        schema.epic_link_field = match &self.settings.epic_link_field {
            Some(id) => {
                debug!(field = %id, "using configured epic link field");
                Some(EpicLinkField {
                    id: id.clone(),
                    provenance: FieldProvenance::Configured,
                })
            }
            None => Some(
                self.discover_epic_link(&global_fields, &schema.story_issue_type)
                    .await,
            ),
        };

        info!(
            epic_type = %schema.epic_issue_type,
            story_type = %schema.story_issue_type,
            subtask_type = %schema.subtask_issue_type,
            epic_name_field = ?schema.epic_name_field,
            epic_link_field = ?schema.epic_link_field,
            issue_types = schema.available_issue_types.len(),
            "tracker schema discovered"
        );
        schema
    }

    /// Creatable issue types for the project, de-duplicated by name.
    async fn available_issue_types(&self) -> Vec<IssueTypeInfo> {
        match self
            .tracker
            .create_metadata(&self.settings.project_key, None)
            .await
        {
            Ok(metas) => {
                let mut types: Vec<IssueTypeInfo> = Vec::with_capacity(metas.len());
                for meta in metas {
                    if !types
                        .iter()
                        .any(|t| t.name.eq_ignore_case(meta.issue_type.name.as_str()))
                    {
                        types.push(meta.issue_type);
                    }
                }
                debug!(count = types.len(), "fetched project issue types");
                types
            }
            Err(error) => {
                warn!(%error, "could not fetch project issue types; using configured names");
                Vec::new()
            }
        }
    }

    async fn global_fields(&self) -> Vec<FieldDefinition> {
        match self.tracker.list_fields().await {
            Ok(fields) => {
                debug!(count = fields.len(), "fetched global field list");
                fields
            }
            Err(error) => {
                warn!(%error, "could not fetch global field list");
                Vec::new()
            }
        }
    }

    /// Fields on the create screen of `issue_type`, or `None` if the
    /// metadata could not be fetched or was empty.
    async fn type_fields(&self, issue_type: &IssueTypeName) -> Option<Vec<FieldDefinition>> {
        match self
            .tracker
            .create_metadata(&self.settings.project_key, Some(issue_type))
            .await
        {
            Ok(metas) if !metas.is_empty() => Some(
                metas
                    .into_iter()
                    .filter(|m| m.issue_type.name.eq_ignore_case(issue_type.as_str()))
                    .flat_map(|m| m.fields)
                    .collect(),
            ),
            Ok(_) => {
                debug!(%issue_type, "tracker returned no create metadata");
                None
            }
            Err(error) => {
                warn!(%issue_type, %error, "could not fetch create metadata");
                None
            }
        }
    }

    async fn discover_epic_name(
        &self,
        global_fields: &[FieldDefinition],
        epic_type: &IssueTypeName,
    ) -> Option<FieldId> {
        if let Some(id) = find_epic_name_field(global_fields) {
            info!(field = %id, "epic name field found in global field list");
            return Some(id);
        }
        let found = self
            .type_fields(epic_type)
            .await
            .and_then(|fields| find_epic_name_field(&fields));
        match &found {
            Some(id) => info!(field = %id, "epic name field found in epic create metadata"),
            None => info!("no epic name field found; epics will rely on fallbacks"),
        }
        found
    }

    async fn discover_epic_link(
        &self,
        global_fields: &[FieldDefinition],
        story_type: &IssueTypeName,
    ) -> EpicLinkField {
        let story_fields = self.type_fields(story_type).await;

        if let Some(id) = find_epic_link_field(global_fields) {
            let on_story_screen = story_fields
                .as_ref()
                .map_or(true, |fields| fields.iter().any(|f| f.id == id.as_str()));
            if on_story_screen {
                info!(field = %id, "epic link field found in global field list");
                return EpicLinkField {
                    id,
                    provenance: FieldProvenance::Discovered,
                };
            }
            debug!(field = %id, "global epic link candidate is not on the story screen");
        }

        if let Some(id) = story_fields
            .as_deref()
            .and_then(find_epic_link_field)
        {
            info!(field = %id, "epic link field found in story create metadata");
            return EpicLinkField {
                id,
                provenance: FieldProvenance::Discovered,
            };
        }

        let assumed = EpicLinkField::assumed_default();
        warn!(field = %assumed.id, "no epic link field found; assuming the common default");
        assumed
    }
}
