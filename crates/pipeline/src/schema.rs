//! Tracker schema model and the pure heuristics used to discover it.
//!
//! A tracker's issue types and custom-field identifiers vary per deployment
//! and cannot be hard-coded. [`TrackerSettings`] holds what the operator
//! *configured*; [`TrackerSchema`] holds what was actually *resolved* against
//! the live tracker. The async probing lives in the `materializer` crate; the
//! matching rules live here so they can be tested without a tracker.

use serde::{Deserialize, Serialize};

use crate::{FieldId, IssueTypeName, ProjectKey};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Story-type names tried, in order, when the configured one is unavailable.
pub const STORY_TYPE_ALTERNATIVES: &[&str] =
    &["Story", "User Story", "Task", "Feature", "Improvement"];

/// Subtask-type names tried, in order, when the configured one is unavailable.
pub const SUBTASK_TYPE_ALTERNATIVES: &[&str] =
    &["Sub-task", "Subtask", "Sub Task", "Technical Task"];

/// Epic-Name field identifiers that are common across tracker installations.
pub const COMMON_EPIC_NAME_FIELDS: &[&str] = &[
    "customfield_10011",
    "customfield_10014",
    "customfield_10015",
    "customfield_10016",
];

/// Epic-Link identifier assumed when nothing better is found.
pub const DEFAULT_EPIC_LINK_FIELD: &str = "customfield_10014";

const EPIC_NAME_CUSTOM_TYPE: &str = "gh-epic-label";
const EPIC_LINK_CUSTOM_TYPE: &str = "gh-epic-link";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Operator-configured expectations about the tracker.
///
/// Nothing here is trusted blindly: issue-type names are re-resolved against
/// the live tracker, and field overrides merely short-circuit a search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerSettings {
    /// Project issues are created in.
    pub project_key: ProjectKey,
    /// Expected epic issue type name.
    pub epic_issue_type: IssueTypeName,
    /// Expected story issue type name.
    pub story_issue_type: IssueTypeName,
    /// Expected subtask issue type name.
    pub subtask_issue_type: IssueTypeName,
    /// Pinned Epic-Name field, skipping detection.
    pub epic_name_field: Option<FieldId>,
    /// Pinned Epic-Link field, skipping detection.
    pub epic_link_field: Option<FieldId>,
    /// Fixed Epic-Name identifiers to try after the detected one, in order.
    pub epic_name_candidates: Vec<FieldId>,
}

impl TrackerSettings {
    /// Settings with the conventional type names (`Epic`, `Story`, `Sub-task`)
    /// and the common Epic-Name candidates.
    pub fn new(project_key: ProjectKey) -> Self {
        Self {
            project_key,
            epic_issue_type: known_type("Epic"),
            story_issue_type: known_type("Story"),
            subtask_issue_type: known_type("Sub-task"),
            epic_name_field: None,
            epic_link_field: None,
            epic_name_candidates: COMMON_EPIC_NAME_FIELDS
                .iter()
                .filter_map(|id| FieldId::new(*id))
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tracker metadata (as reported by the tracker)
// ---------------------------------------------------------------------------

/// An issue type the project can create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueTypeInfo {
    /// Tracker spelling of the type name.
    pub name: IssueTypeName,
    /// Whether the tracker flags this as a sub-task type.
    pub subtask: bool,
}

/// A field definition from the global field list or from create metadata.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Field identifier (e.g. `"customfield_10011"` or `"summary"`).
    pub id: String,
    /// Display name (e.g. `"Epic Name"`).
    pub name: String,
    /// Whether this is a custom field.
    pub custom: bool,
    /// JQL clause names.
    pub clause_names: Vec<String>,
    /// Custom-field plugin type (e.g. `"com.pyxis.greenhopper.jira:gh-epic-label"`).
    pub custom_type: Option<String>,
}

/// Create metadata for one issue type in the project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueTypeMeta {
    /// The issue type.
    pub issue_type: IssueTypeInfo,
    /// Fields available on its create screen.
    pub fields: Vec<FieldDefinition>,
}

// ---------------------------------------------------------------------------
// Resolved schema
// ---------------------------------------------------------------------------

/// Where a field identifier came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldProvenance {
    /// Pinned by configuration.
    Configured,
    /// Found by probing the tracker.
    Discovered,
    /// Well-known default; a hypothesis to drop on the first rejection.
    Assumed,
}

/// The field used to link a story to its epic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpicLinkField {
    /// Field identifier.
    pub id: FieldId,
    /// How it was obtained.
    pub provenance: FieldProvenance,
}

impl EpicLinkField {
    /// The well-known default identifier, held as a hypothesis.
    pub fn assumed_default() -> Self {
        Self {
            id: FieldId::from_literal(DEFAULT_EPIC_LINK_FIELD),
            provenance: FieldProvenance::Assumed,
        }
    }
}

/// The epic-name strategy that last succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearnedEpicName {
    /// Epics were accepted with this Epic-Name field.
    Field(FieldId),
    /// Epics were accepted without any Epic-Name field.
    Omitted,
}

/// Issue types and field identifiers resolved against a live tracker.
///
/// Discovered once per connection and cached on the session. The only later
/// changes are [`SchemaUpdate`]s learned from successful (or hypothesis-
/// refuting) create calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerSchema {
    /// Resolved epic type.
    pub epic_issue_type: IssueTypeName,
    /// Resolved story type.
    pub story_issue_type: IssueTypeName,
    /// Resolved subtask type.
    pub subtask_issue_type: IssueTypeName,
    /// Detected Epic-Name field, if the tracker has one.
    pub epic_name_field: Option<FieldId>,
    /// Field for linking stories to epics.
    pub epic_link_field: Option<EpicLinkField>,
    /// Creatable issue types, in tracker order, de-duplicated.
    pub available_issue_types: Vec<IssueTypeInfo>,
    /// Epic-Name strategy that last worked in this session.
    pub learned_epic_name: Option<LearnedEpicName>,
}

impl TrackerSchema {
    /// A schema built from configuration alone, with nothing detected.
    ///
    /// This is the legal "fully empty" outcome of discovery.
    pub fn from_settings(settings: &TrackerSettings) -> Self {
        Self {
            epic_issue_type: settings.epic_issue_type.clone(),
            story_issue_type: settings.story_issue_type.clone(),
            subtask_issue_type: settings.subtask_issue_type.clone(),
            epic_name_field: settings.epic_name_field.clone(),
            epic_link_field: settings.epic_link_field.clone().map(|id| EpicLinkField {
                id,
                provenance: FieldProvenance::Configured,
            }),
            available_issue_types: Vec::new(),
            learned_epic_name: None,
        }
    }

    /// Issue types a story could fall back to when its type is refused:
    /// every available type that is neither the current story type, an epic
    /// type, nor a sub-task type.
    pub fn alternate_story_types(&self) -> Vec<IssueTypeName> {
        self.available_issue_types
            .iter()
            .filter(|t| !t.name.eq_ignore_case(self.story_issue_type.as_str()))
            .filter(|t| !t.name.eq_ignore_case(self.epic_issue_type.as_str()))
            .filter(|t| is_story_like(t))
            .map(|t| t.name.clone())
            .collect()
    }

    /// Applies a learned update.
    pub fn apply(&mut self, update: &SchemaUpdate) {
        match update {
            SchemaUpdate::EpicNameLearned(learned) => {
                if let LearnedEpicName::Field(id) = learned {
                    self.epic_name_field = Some(id.clone());
                }
                self.learned_epic_name = Some(learned.clone());
            }
            SchemaUpdate::StoryIssueTypeAdopted(name) => {
                self.story_issue_type = name.clone();
            }
            SchemaUpdate::EpicLinkDiscarded(id) => {
                if self.epic_link_field.as_ref().is_some_and(|f| &f.id == id) {
                    self.epic_link_field = None;
                }
            }
        }
    }
}

/// A change to the cached schema, learned from a create call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaUpdate {
    /// An epic-name strategy succeeded; later epics start with it.
    EpicNameLearned(LearnedEpicName),
    /// An alternate story type succeeded; it becomes the story default.
    StoryIssueTypeAdopted(IssueTypeName),
    /// An assumed Epic-Link field was refused; stop sending it.
    EpicLinkDiscarded(FieldId),
}

// ---------------------------------------------------------------------------
// Issue-type heuristics
// ---------------------------------------------------------------------------

fn known_type(name: &'static str) -> IssueTypeName {
    IssueTypeName::from_literal(name)
}

fn name_has_subtask_token(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.contains("sub-task") || lower.contains("subtask") || lower.contains("sub task")
}

fn is_subtask_like(info: &IssueTypeInfo) -> bool {
    info.subtask || name_has_subtask_token(info.name.as_str())
}

fn is_story_like(info: &IssueTypeInfo) -> bool {
    !is_subtask_like(info) && !info.name.as_str().to_ascii_lowercase().contains("epic")
}

fn find_by_name<'a>(available: &'a [IssueTypeInfo], wanted: &str) -> Option<&'a IssueTypeInfo> {
    available.iter().find(|t| t.name.eq_ignore_case(wanted))
}

/// Resolves the epic type: the tracker's spelling of the configured name, or
/// the configured name unchanged.
pub fn resolve_epic_type(
    available: &[IssueTypeInfo],
    configured: &IssueTypeName,
) -> IssueTypeName {
    find_by_name(available, configured.as_str())
        .map(|t| t.name.clone())
        .unwrap_or_else(|| configured.clone())
}

/// Resolves the story type.
///
/// 1. configured name (case-insensitive);
/// 2. first of [`STORY_TYPE_ALTERNATIVES`] that exists;
/// 3. first available type that is neither epic nor sub-task;
/// 4. the configured name, left for creation to fail loudly.
pub fn resolve_story_type(
    available: &[IssueTypeInfo],
    configured: &IssueTypeName,
) -> IssueTypeName {
    resolve_with(available, configured, STORY_TYPE_ALTERNATIVES, is_story_like)
}

/// Resolves the subtask type with the same tiers as [`resolve_story_type`],
/// using [`SUBTASK_TYPE_ALTERNATIVES`]. Tier 3 picks the first type the
/// tracker flags (or names) as a sub-task type.
pub fn resolve_subtask_type(
    available: &[IssueTypeInfo],
    configured: &IssueTypeName,
) -> IssueTypeName {
    resolve_with(available, configured, SUBTASK_TYPE_ALTERNATIVES, is_subtask_like)
}

fn resolve_with(
    available: &[IssueTypeInfo],
    configured: &IssueTypeName,
    alternatives: &[&str],
    fallback_filter: fn(&IssueTypeInfo) -> bool,
) -> IssueTypeName {
    if let Some(found) = find_by_name(available, configured.as_str()) {
        return found.name.clone();
    }
    if let Some(found) = alternatives
        .iter()
        .find_map(|alt| find_by_name(available, alt))
    {
        return found.name.clone();
    }
    if let Some(found) = available.iter().find(|t| fallback_filter(t)) {
        return found.name.clone();
    }
    configured.clone()
}

// ---------------------------------------------------------------------------
// Field heuristics
// ---------------------------------------------------------------------------

fn mentions_both(text: &str, a: &str, b: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    lower.contains(a) && lower.contains(b)
}

fn matches_field(field: &FieldDefinition, noun: &str, custom_type: &str) -> bool {
    let compact = format!("epic{noun}");
    let spaced = format!("epic {noun}");
    mentions_both(&field.name, "epic", noun)
        || field.id.eq_ignore_ascii_case(&compact)
        || field.clause_names.iter().any(|c| {
            let c = c.to_ascii_lowercase();
            c == compact || c == spaced || c == format!("\"{spaced}\"")
        })
        || field
            .custom_type
            .as_deref()
            .is_some_and(|t| t.ends_with(custom_type))
}

/// Looks for a field suggestive of "Epic Name".
///
/// Fields with an exact name match win over looser matches.
pub fn find_epic_name_field(fields: &[FieldDefinition]) -> Option<FieldId> {
    find_field(fields, "name", EPIC_NAME_CUSTOM_TYPE)
}

/// Looks for a field suggestive of "Epic Link".
pub fn find_epic_link_field(fields: &[FieldDefinition]) -> Option<FieldId> {
    find_field(fields, "link", EPIC_LINK_CUSTOM_TYPE)
}

fn find_field(fields: &[FieldDefinition], noun: &str, custom_type: &str) -> Option<FieldId> {
    let exact = format!("epic {noun}");
    fields
        .iter()
        .find(|f| f.name.trim().eq_ignore_ascii_case(&exact))
        .or_else(|| fields.iter().find(|f| matches_field(f, noun, custom_type)))
        .and_then(|f| FieldId::new(f.id.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn types(specs: &[(&str, bool)]) -> Vec<IssueTypeInfo> {
        specs
            .iter()
            .map(|(name, subtask)| IssueTypeInfo {
                name: IssueTypeName::new(*name).unwrap(),
                subtask: *subtask,
            })
            .collect()
    }

    fn name(s: &str) -> IssueTypeName {
        IssueTypeName::new(s).unwrap()
    }

    fn field(id: &str, name: &str) -> FieldDefinition {
        FieldDefinition {
            id: id.into(),
            name: name.into(),
            custom: id.starts_with("customfield_"),
            ..FieldDefinition::default()
        }
    }

    #[test]
    fn configured_story_type_matches_case_insensitively() {
        let available = types(&[("Epic", false), ("story", false), ("Sub-task", true)]);
        assert_eq!(resolve_story_type(&available, &name("Story")), name("story"));
    }

    #[test]
    fn story_type_falls_back_to_preference_list() {
        let available = types(&[("Epic", false), ("Bug", false), ("Task", false)]);
        assert_eq!(resolve_story_type(&available, &name("Story")), name("Task"));
    }

    #[test]
    fn story_type_falls_back_to_first_plain_type() {
        let available = types(&[("Epic", false), ("Sub-task", true), ("Bug", false)]);
        assert_eq!(resolve_story_type(&available, &name("Story")), name("Bug"));
    }

    #[test]
    fn story_type_keeps_configured_name_when_nothing_fits() {
        let available = types(&[("Epic", false), ("Subtask", true)]);
        assert_eq!(resolve_story_type(&available, &name("Story")), name("Story"));
        assert_eq!(resolve_story_type(&[], &name("Story")), name("Story"));
    }

    #[test]
    fn subtask_type_uses_its_own_alternatives() {
        let available = types(&[("Story", false), ("Subtask", true)]);
        assert_eq!(
            resolve_subtask_type(&available, &name("Sub-task")),
            name("Subtask")
        );
    }

    #[test]
    fn subtask_type_falls_back_to_flagged_type() {
        let available = types(&[("Story", false), ("Checklist Item", true)]);
        assert_eq!(
            resolve_subtask_type(&available, &name("Sub-task")),
            name("Checklist Item")
        );
    }

    #[test]
    fn epic_type_uses_tracker_spelling() {
        let available = types(&[("EPIC", false)]);
        assert_eq!(resolve_epic_type(&available, &name("Epic")), name("EPIC"));
    }

    #[test]
    fn epic_name_found_by_display_name() {
        let fields = vec![
            field("summary", "Summary"),
            field("customfield_10011", "Epic Name"),
            field("customfield_10014", "Epic Link"),
        ];
        assert_eq!(
            find_epic_name_field(&fields),
            FieldId::new("customfield_10011")
        );
        assert_eq!(
            find_epic_link_field(&fields),
            FieldId::new("customfield_10014")
        );
    }

    #[test]
    fn epic_name_found_by_custom_type_or_clause() {
        let mut by_type = field("customfield_20000", "Kurzname");
        by_type.custom_type = Some("com.pyxis.greenhopper.jira:gh-epic-label".into());
        assert_eq!(
            find_epic_name_field(&[by_type]),
            FieldId::new("customfield_20000")
        );

        let mut by_clause = field("customfield_30000", "Label");
        by_clause.clause_names = vec!["cf[30000]".into(), "Epic Name".into()];
        assert_eq!(
            find_epic_name_field(&[by_clause]),
            FieldId::new("customfield_30000")
        );
    }

    #[test]
    fn unrelated_fields_are_not_guessed() {
        let fields = vec![field("summary", "Summary"), field("customfield_1", "Team")];
        assert_eq!(find_epic_name_field(&fields), None);
        assert_eq!(find_epic_link_field(&fields), None);
    }

    #[test]
    fn alternate_story_types_exclude_epic_subtask_and_current() {
        let mut schema = TrackerSchema::from_settings(&TrackerSettings::new(
            ProjectKey::new("P").unwrap(),
        ));
        schema.available_issue_types = types(&[
            ("Epic", false),
            ("Story", false),
            ("Task", false),
            ("Sub-task", true),
            ("Bug", false),
        ]);
        assert_eq!(schema.alternate_story_types(), vec![name("Task"), name("Bug")]);
    }

    #[test]
    fn learning_updates_the_schema() {
        let mut schema = TrackerSchema::from_settings(&TrackerSettings::new(
            ProjectKey::new("P").unwrap(),
        ));
        let id = FieldId::new("customfield_10015").unwrap();
        schema.apply(&SchemaUpdate::EpicNameLearned(LearnedEpicName::Field(id.clone())));
        assert_eq!(schema.epic_name_field, Some(id.clone()));

        schema.apply(&SchemaUpdate::StoryIssueTypeAdopted(name("Task")));
        assert_eq!(schema.story_issue_type, name("Task"));

        schema.epic_link_field = Some(EpicLinkField {
            id: FieldId::new(DEFAULT_EPIC_LINK_FIELD).unwrap(),
            provenance: FieldProvenance::Assumed,
        });
        schema.apply(&SchemaUpdate::EpicLinkDiscarded(
            FieldId::new(DEFAULT_EPIC_LINK_FIELD).unwrap(),
        ));
        assert_eq!(schema.epic_link_field, None);
    }
}
