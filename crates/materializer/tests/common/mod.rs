//! In-memory fakes of the tracker and model ports.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use materializer::TrackerSession;
use parking_lot::Mutex;
use pipeline::{
    FieldDefinition, ImagePayload, IssueKey, IssueReceipt, IssueRequest, IssueTracker,
    IssueTypeInfo, IssueTypeMeta, IssueTypeName, LlmError, LlmProvider, ProjectKey, Rejection,
    RejectionKind, TrackerError, TrackerSettings,
};

type Rule = Box<dyn Fn(&IssueRequest) -> Option<TrackerError> + Send + Sync>;
type Observer = Box<dyn Fn(&IssueRequest, &IssueKey) + Send + Sync>;

/// A scripted tracker.
///
/// Every create call is recorded. Rules are consulted in order and the first
/// one returning an error refuses the request; otherwise the issue is created
/// with the next key `X-1`, `X-2`, ...
#[derive(Default)]
pub struct FakeTracker {
    rules: Vec<Rule>,
    observer: Option<Observer>,
    fields: Option<Vec<FieldDefinition>>,
    metadata: Option<Vec<IssueTypeMeta>>,
    next_key: AtomicUsize,
    pub created: Mutex<Vec<(IssueRequest, IssueKey)>>,
    pub requests: Mutex<Vec<IssueRequest>>,
    pub field_calls: AtomicUsize,
    pub metadata_calls: AtomicUsize,
}

impl FakeTracker {
    /// A tracker that answers every metadata query with an error.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fields(mut self, fields: Vec<FieldDefinition>) -> Self {
        self.fields = Some(fields);
        self
    }

    pub fn with_metadata(mut self, metadata: Vec<IssueTypeMeta>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_rule(
        mut self,
        rule: impl Fn(&IssueRequest) -> Option<TrackerError> + Send + Sync + 'static,
    ) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn on_created(
        mut self,
        observer: impl Fn(&IssueRequest, &IssueKey) + Send + Sync + 'static,
    ) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn created_keys(&self) -> Vec<String> {
        self.created
            .lock()
            .iter()
            .map(|(_, key)| key.to_string())
            .collect()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests_of_type(&self, issue_type: &str) -> Vec<IssueRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.issue_type.as_str() == issue_type)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl IssueTracker for FakeTracker {
    async fn create_issue(&self, request: &IssueRequest) -> Result<IssueReceipt, TrackerError> {
        self.requests.lock().push(request.clone());
        if let Some(error) = self.rules.iter().find_map(|rule| rule(request)) {
            return Err(error);
        }
        let n = self.next_key.fetch_add(1, Ordering::SeqCst) + 1;
        let key = IssueKey::new(format!("X-{n}")).unwrap();
        self.created.lock().push((request.clone(), key.clone()));
        if let Some(observer) = &self.observer {
            observer(request, &key);
        }
        Ok(IssueReceipt {
            self_url: format!("https://tracker.test/rest/api/2/issue/{n}"),
            key,
        })
    }

    async fn list_fields(&self) -> Result<Vec<FieldDefinition>, TrackerError> {
        self.field_calls.fetch_add(1, Ordering::SeqCst);
        self.fields.clone().ok_or(TrackerError::Http {
            status: 500,
            message: "field list unavailable".into(),
        })
    }

    async fn create_metadata(
        &self,
        _project: &ProjectKey,
        issue_type: Option<&IssueTypeName>,
    ) -> Result<Vec<IssueTypeMeta>, TrackerError> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        let metadata = self.metadata.clone().ok_or(TrackerError::Transport {
            message: "connection refused".into(),
        })?;
        Ok(match issue_type {
            None => metadata,
            Some(wanted) => metadata
                .into_iter()
                .filter(|m| m.issue_type.name.eq_ignore_case(wanted.as_str()))
                .collect(),
        })
    }
}

/// A model that returns a canned response.
pub struct FakeLlm {
    response: Result<String, LlmError>,
    on_generate: Option<Box<dyn Fn() + Send + Sync>>,
    pub calls: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeLlm {
    pub fn replying(text: impl Into<String>) -> Self {
        Self {
            response: Ok(text.into()),
            on_generate: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: LlmError) -> Self {
        Self {
            response: Err(error),
            ..Self::replying("")
        }
    }

    pub fn on_generate(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_generate = Some(Box::new(hook));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for FakeLlm {
    async fn generate(&self, prompt: &str, _images: &[ImagePayload]) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(prompt.to_string());
        if let Some(hook) = &self.on_generate {
            hook();
        }
        self.response.clone()
    }

    fn model_name(&self) -> &str {
        "fake-model"
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn settings() -> TrackerSettings {
    TrackerSettings::new(ProjectKey::new("X").unwrap())
}

pub fn session(tracker: &Arc<FakeTracker>) -> Arc<TrackerSession> {
    session_with(tracker, settings())
}

pub fn session_with(tracker: &Arc<FakeTracker>, settings: TrackerSettings) -> Arc<TrackerSession> {
    let port: Arc<dyn IssueTracker> = tracker.clone();
    Arc::new(TrackerSession::new(port, settings))
}

pub fn field(id: &str, name: &str) -> FieldDefinition {
    FieldDefinition {
        id: id.into(),
        name: name.into(),
        custom: id.starts_with("customfield_"),
        ..FieldDefinition::default()
    }
}

pub fn meta(name: &str, subtask: bool, fields: Vec<FieldDefinition>) -> IssueTypeMeta {
    IssueTypeMeta {
        issue_type: IssueTypeInfo {
            name: IssueTypeName::new(name).unwrap(),
            subtask,
        },
        fields,
    }
}

/// A create screen with the summary plus `extra`.
fn screen(extra: FieldDefinition) -> Vec<FieldDefinition> {
    vec![field("summary", "Summary"), extra]
}

/// A conventional project: Epic, Story, Task, Sub-task with the usual
/// Epic-Name and Epic-Link fields.
pub fn standard_metadata() -> Vec<IssueTypeMeta> {
    vec![
        meta("Epic", false, screen(field("customfield_10011", "Epic Name"))),
        meta("Story", false, screen(field("customfield_10014", "Epic Link"))),
        meta("Task", false, screen(field("customfield_10014", "Epic Link"))),
        meta("Sub-task", true, screen(field("parent", "Parent"))),
    ]
}

pub fn standard_fields() -> Vec<FieldDefinition> {
    vec![
        field("summary", "Summary"),
        field("priority", "Priority"),
        field("customfield_10011", "Epic Name"),
        field("customfield_10014", "Epic Link"),
    ]
}

pub fn rejection(kind: RejectionKind, field: &str, message: &str) -> TrackerError {
    let fields = if field.is_empty() {
        Vec::new()
    } else {
        vec![field.to_string()]
    };
    TrackerError::Rejected(Rejection::new(kind, fields, message))
}
