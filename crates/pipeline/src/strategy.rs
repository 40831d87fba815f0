//! Issue-creation strategies as data.
//!
//! Each strategy is a pure function from (issue data, schema hints) to an
//! [`Attempt`]: the request to send, plus the [`SchemaUpdate`] to apply if the
//! tracker accepts it. The creator walks a *ladder* of strategies, one network
//! call per step, stopping at the first success. Keeping the ladder as a list
//! makes every retry path enumerable in tests.

use serde_json::{json, Value};

use crate::{
    Epic, FieldId, IssueKey, IssueRequest, IssueTypeName, LearnedEpicName, ProjectKey, Rejection,
    RejectionKind, SchemaUpdate, Story, Subtask, TrackerSchema,
};

/// Upper bound on create calls spent on one epic.
pub const MAX_EPIC_ATTEMPTS: usize = 4;

const PRIORITY_FIELD: &str = "priority";
const PARENT_FIELD: &str = "parent";

/// One planned create call.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    /// Short name of the strategy, for logs.
    pub label: String,
    /// Request to send.
    pub request: IssueRequest,
    /// Learned update to apply to the session schema on success.
    pub on_success: Option<SchemaUpdate>,
}

// ---------------------------------------------------------------------------
// Epics
// ---------------------------------------------------------------------------

/// A way of creating an epic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EpicStrategy {
    /// Core fields plus this Epic-Name field, valued with the summary.
    WithEpicName(FieldId),
    /// Core fields only.
    WithoutEpicName,
}

impl EpicStrategy {
    /// Builds the create call for `epic`.
    pub fn plan(&self, epic: &Epic, project: &ProjectKey, schema: &TrackerSchema) -> Attempt {
        let request = IssueRequest::new(
            project.clone(),
            &epic.summary,
            &epic.description,
            schema.epic_issue_type.clone(),
        );
        match self {
            Self::WithEpicName(field) => Attempt {
                label: format!("epic-name:{field}"),
                request: request.with_field(field.as_str(), Value::String(epic.summary.clone())),
                on_success: Some(SchemaUpdate::EpicNameLearned(LearnedEpicName::Field(
                    field.clone(),
                ))),
            },
            Self::WithoutEpicName => Attempt {
                label: "without-epic-name".to_string(),
                request,
                on_success: Some(SchemaUpdate::EpicNameLearned(LearnedEpicName::Omitted)),
            },
        }
    }

    /// Whether `rejection` of this strategy justifies trying the next rung.
    ///
    /// Only field-related refusals do: an invalid issue type or a permission
    /// problem will not be fixed by a different Epic-Name field.
    pub fn retry_warranted(&self, rejection: &Rejection) -> bool {
        rejection.is_field_related()
            || matches!(self, Self::WithEpicName(field) if rejection.mentions_field(field.as_str()))
    }
}

/// Orders the epic strategies for the current schema.
///
/// Precedence: the strategy learned earlier in this session, then the
/// detected Epic-Name field (or no field when none was detected), then each
/// configured candidate, then omission. Duplicates are removed and the ladder
/// is capped at [`MAX_EPIC_ATTEMPTS`] with omission always kept last.
pub fn epic_ladder(schema: &TrackerSchema, candidates: &[FieldId]) -> Vec<EpicStrategy> {
    let mut ladder = Vec::with_capacity(candidates.len() + 3);
    match &schema.learned_epic_name {
        Some(LearnedEpicName::Field(id)) => ladder.push(EpicStrategy::WithEpicName(id.clone())),
        Some(LearnedEpicName::Omitted) => ladder.push(EpicStrategy::WithoutEpicName),
        None => {}
    }
    ladder.push(match &schema.epic_name_field {
        Some(id) => EpicStrategy::WithEpicName(id.clone()),
        None => EpicStrategy::WithoutEpicName,
    });
    ladder.extend(candidates.iter().cloned().map(EpicStrategy::WithEpicName));
    ladder.push(EpicStrategy::WithoutEpicName);

    let mut unique: Vec<EpicStrategy> = Vec::with_capacity(ladder.len());
    for strategy in ladder {
        if !unique.contains(&strategy) {
            unique.push(strategy);
        }
    }

    if unique.len() > MAX_EPIC_ATTEMPTS {
        if unique[..MAX_EPIC_ATTEMPTS].contains(&EpicStrategy::WithoutEpicName) {
            unique.truncate(MAX_EPIC_ATTEMPTS);
        } else {
            unique.truncate(MAX_EPIC_ATTEMPTS - 1);
            unique.push(EpicStrategy::WithoutEpicName);
        }
    }
    unique
}

// ---------------------------------------------------------------------------
// Stories
// ---------------------------------------------------------------------------

/// A way of creating a story.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoryStrategy {
    /// Core fields, priority (if any) and Epic-Link (if possible).
    Standard,
    /// As [`StoryStrategy::Standard`] but with another issue type.
    AlternateIssueType(IssueTypeName),
    /// As [`StoryStrategy::Standard`] without priority.
    WithoutPriority,
    /// Core fields only: no priority, no Epic-Link.
    Bare,
}

impl StoryStrategy {
    /// Builds the create call for `story` under `parent`.
    ///
    /// `proven_type` is an issue type an earlier step of this ladder sent
    /// without an invalid-type refusal. The priority-free and bare steps use it
    /// in place of the schema's story type. Any type other than the schema's
    /// is adopted for the rest of the session on success.
    pub fn plan(
        &self,
        story: &Story,
        parent: Option<&IssueKey>,
        proven_type: Option<&IssueTypeName>,
        project: &ProjectKey,
        schema: &TrackerSchema,
    ) -> Attempt {
        let issue_type = match (self, proven_type) {
            (Self::AlternateIssueType(name), _) => name.clone(),
            (Self::WithoutPriority | Self::Bare, Some(proven)) => proven.clone(),
            _ => schema.story_issue_type.clone(),
        };
        let on_success = (!issue_type.eq_ignore_case(schema.story_issue_type.as_str()))
            .then(|| SchemaUpdate::StoryIssueTypeAdopted(issue_type.clone()));

        let mut request = IssueRequest::new(
            project.clone(),
            &story.summary,
            &story.description,
            issue_type,
        );

        let with_priority = matches!(self, Self::Standard | Self::AlternateIssueType(_));
        if with_priority {
            if let Some(name) = story.priority.tracker_name() {
                request = request.with_field(PRIORITY_FIELD, json!({ "name": name }));
            }
        }
        if !matches!(self, Self::Bare) {
            if let (Some(parent), Some(link)) = (parent, &schema.epic_link_field) {
                request = request.with_field(link.id.as_str(), Value::String(parent.to_string()));
            }
        }

        let label = match self {
            Self::Standard => "standard".to_string(),
            Self::AlternateIssueType(name) => format!("issue-type:{name}"),
            Self::WithoutPriority => "without-priority".to_string(),
            Self::Bare => "without-priority-or-link".to_string(),
        };
        Attempt {
            label,
            request,
            on_success,
        }
    }

    /// Whether this strategy is worth a call after the previous step was
    /// refused with `rejection`.
    pub fn applies_after(&self, rejection: &Rejection, story: &Story) -> bool {
        match self {
            Self::Standard | Self::Bare => true,
            Self::AlternateIssueType(_) => rejection.kind == RejectionKind::InvalidIssueType,
            Self::WithoutPriority => {
                story.priority.tracker_name().is_some() && rejection.mentions_field(PRIORITY_FIELD)
            }
        }
    }
}

/// Orders the story strategies: standard, one per alternate issue type,
/// without priority, bare. Length is `1 + alternates + 2`.
pub fn story_ladder(schema: &TrackerSchema) -> Vec<StoryStrategy> {
    let alternates = schema.alternate_story_types();
    let mut ladder = Vec::with_capacity(alternates.len() + 3);
    ladder.push(StoryStrategy::Standard);
    ladder.extend(alternates.into_iter().map(StoryStrategy::AlternateIssueType));
    ladder.push(StoryStrategy::WithoutPriority);
    ladder.push(StoryStrategy::Bare);
    ladder
}

// ---------------------------------------------------------------------------
// Subtasks
// ---------------------------------------------------------------------------

/// The single create call for a subtask under `parent`.
pub fn subtask_attempt(
    subtask: &Subtask,
    parent: &IssueKey,
    project: &ProjectKey,
    schema: &TrackerSchema,
) -> Attempt {
    let request = IssueRequest::new(
        project.clone(),
        &subtask.summary,
        &subtask.description,
        schema.subtask_issue_type.clone(),
    )
    .with_field(PARENT_FIELD, json!({ "key": parent.as_str() }));
    Attempt {
        label: "subtask".to_string(),
        request,
        on_success: None,
    }
}
