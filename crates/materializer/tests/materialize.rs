mod common;

use std::sync::Arc;

use common::{rejection, session, standard_fields, standard_metadata, FakeTracker};
use materializer::{HierarchyOrchestrator, IssueCreator, CANCELLED_MESSAGE};
use pipeline::{
    extract_document, Category, CreatedIssue, Epic, IssueKey, Priority, RejectionKind,
    RequirementsDocument, Story, Subtask, TrackerError,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

fn subtask(summary: &str) -> Subtask {
    Subtask {
        summary: summary.into(),
        description: String::new(),
        number: None,
    }
}

fn story(summary: &str, priority: Priority, subtasks: Vec<Subtask>) -> Story {
    Story {
        summary: summary.into(),
        description: format!("{summary} description"),
        priority,
        number: None,
        subtasks,
    }
}

fn epic(summary: &str, stories: Vec<Story>) -> Epic {
    Epic {
        summary: summary.into(),
        description: format!("{summary} description"),
        category: Category::Functional,
        number: None,
        stories,
    }
}

/// `epics` epics, each with `stories` stories, each with `subtasks` subtasks.
fn grid(epics: usize, stories: usize, subtasks: usize) -> RequirementsDocument {
    RequirementsDocument {
        epics: (1..=epics)
            .map(|e| {
                epic(
                    &format!("Epic {e}"),
                    (1..=stories)
                        .map(|s| {
                            story(
                                &format!("Story {e}.{s}"),
                                Priority::Medium,
                                (1..=subtasks)
                                    .map(|t| subtask(&format!("Subtask {e}.{s}.{t}")))
                                    .collect(),
                            )
                        })
                        .collect(),
                )
            })
            .collect(),
    }
}

fn keys(issues: &[CreatedIssue]) -> Vec<String> {
    issues.iter().map(|i| i.key.to_string()).collect()
}

fn string(value: &str) -> Value {
    Value::String(value.into())
}

#[tokio::test]
async fn every_item_is_created_under_its_parent() {
    let tracker = Arc::new(
        FakeTracker::new()
            .with_metadata(standard_metadata())
            .with_fields(standard_fields()),
    );
    let orchestrator = HierarchyOrchestrator::new(session(&tracker));

    let result = orchestrator
        .materialize(&grid(2, 3, 2), &CancellationToken::new())
        .await;

    assert_eq!(result.errors, Vec::<String>::new());
    assert_eq!(result.epics.len(), 2);
    assert_eq!(result.stories.len(), 6);
    assert_eq!(result.subtasks.len(), 12);
    assert_eq!(tracker.request_count(), 20);

    // Walk the creation log: every story links to the latest epic, every
    // subtask is parented to the latest story.
    let mut epic_key: Option<IssueKey> = None;
    let mut story_key: Option<IssueKey> = None;
    for (request, key) in tracker.created.lock().iter() {
        match request.issue_type.as_str() {
            "Epic" => {
                assert_eq!(request.field("customfield_10011"), Some(&string(&request.summary)));
                epic_key = Some(key.clone());
            }
            "Story" => {
                let parent = epic_key.as_ref().unwrap();
                assert_eq!(request.field("customfield_10014"), Some(&string(parent.as_str())));
                assert_eq!(request.field("priority"), Some(&json!({"name": "Medium"})));
                story_key = Some(key.clone());
            }
            "Sub-task" => {
                let parent = story_key.as_ref().unwrap();
                assert_eq!(request.field("parent"), Some(&json!({"key": parent.as_str()})));
            }
            other => panic!("unexpected issue type {other}"),
        }
    }
}

#[tokio::test]
async fn login_example_materializes_as_three_linked_issues() {
    let raw = r#"{"epics":[{"summary":"Login","stories":[{"summary":"As a user I can log in","subtasks":[{"summary":"Add login form"}]}]}]}"#;
    let document = extract_document(raw).unwrap();
    let tracker = Arc::new(FakeTracker::new());
    let orchestrator = HierarchyOrchestrator::new(session(&tracker));

    let result = orchestrator
        .materialize(&document, &CancellationToken::new())
        .await;

    assert!(result.errors.is_empty());
    assert_eq!(keys(&result.epics), vec!["X-1"]);
    assert_eq!(keys(&result.stories), vec!["X-2"]);
    assert_eq!(keys(&result.subtasks), vec!["X-3"]);
    assert_eq!(result.stories[0].summary, "As a user I can log in");

    let created = tracker.created.lock();
    // With nothing discovered the link field is the assumed default.
    assert_eq!(created[1].0.field("customfield_10014"), Some(&string("X-1")));
    assert_eq!(created[2].0.field("parent"), Some(&json!({"key": "X-2"})));
}

#[tokio::test]
async fn required_epic_name_is_found_by_walking_the_candidates() {
    // Only customfield_10015 satisfies this tracker, and nothing was discovered.
    let tracker = Arc::new(FakeTracker::new().with_rule(|request| {
        (request.issue_type.as_str() == "Epic" && request.field("customfield_10015").is_none())
            .then(|| {
                rejection(
                    RejectionKind::MissingRequiredField,
                    "customfield_10015",
                    "Epic Name is required.",
                )
            })
    }));
    let session = session(&tracker);
    let creator = IssueCreator::new(&session);

    let first = creator.create_epic(&epic("Billing", Vec::new())).await.unwrap();
    assert_eq!(first.key.as_str(), "X-1");
    let tried: Vec<Vec<String>> = tracker
        .requests
        .lock()
        .iter()
        .map(|r| r.fields.keys().cloned().collect())
        .collect();
    assert_eq!(
        tried,
        vec![
            vec![],
            vec!["customfield_10011".to_string()],
            vec!["customfield_10014".to_string()],
            vec!["customfield_10015".to_string()],
        ]
    );

    // The next epic starts with what worked.
    creator.create_epic(&epic("Reports", Vec::new())).await.unwrap();
    assert_eq!(tracker.request_count(), 5);
    assert!(tracker.requests.lock()[4].field("customfield_10015").is_some());
}

#[tokio::test]
async fn epic_is_created_without_epic_name_when_every_field_is_refused() {
    let tracker = Arc::new(
        FakeTracker::new()
            .with_metadata(standard_metadata())
            .with_fields(standard_fields())
            .with_rule(|request| {
                let custom = request.fields.keys().find(|k| k.starts_with("customfield_"))?;
                (request.issue_type.as_str() == "Epic").then(|| {
                    rejection(
                        RejectionKind::UnknownField,
                        custom,
                        "Field cannot be set. It is not on the appropriate screen, or unknown.",
                    )
                })
            }),
    );
    let session = session(&tracker);
    let creator = IssueCreator::new(&session);

    creator.create_epic(&epic("Search", Vec::new())).await.unwrap();
    let epics = tracker.requests_of_type("Epic");
    assert_eq!(epics.len(), 4);
    assert!(epics[3].fields.is_empty());

    creator.create_epic(&epic("Audit", Vec::new())).await.unwrap();
    assert_eq!(tracker.requests_of_type("Epic").len(), 5);
}

#[tokio::test]
async fn non_field_rejection_stops_the_epic_ladder() {
    let tracker = Arc::new(FakeTracker::new().with_rule(|_| {
        Some(rejection(
            RejectionKind::InvalidIssueType,
            "issuetype",
            "Specify a valid issue type",
        ))
    }));
    let session = session(&tracker);

    let error = IssueCreator::new(&session)
        .create_epic(&epic("Login", Vec::new()))
        .await
        .unwrap_err();

    assert_eq!(tracker.request_count(), 1);
    assert_eq!(error.attempts, 1);
    assert!(error.to_string().starts_with("Failed to create epic: Login ("));
}

#[tokio::test]
async fn refused_credentials_end_the_ladder_immediately() {
    let tracker = Arc::new(
        FakeTracker::new().with_rule(|_| Some(TrackerError::Unauthorized { status: 401 })),
    );
    let session = session(&tracker);

    let error = IssueCreator::new(&session)
        .create_story(&story("Profile", Priority::High, Vec::new()), None)
        .await
        .unwrap_err();

    assert_eq!(tracker.request_count(), 1);
    assert_eq!(error.reason, TrackerError::Unauthorized { status: 401 });
}

#[tokio::test]
async fn story_adopts_an_alternate_issue_type_for_the_rest_of_the_run() {
    let tracker = Arc::new(
        FakeTracker::new()
            .with_metadata(standard_metadata())
            .with_fields(standard_fields())
            .with_rule(|request| {
                (request.issue_type.as_str() == "Story").then(|| {
                    rejection(
                        RejectionKind::InvalidIssueType,
                        "issuetype",
                        "Specify a valid issue type",
                    )
                })
            }),
    );
    let session = session(&tracker);
    let creator = IssueCreator::new(&session);
    let epic_key = IssueKey::new("X-100").unwrap();

    let first = creator
        .create_story(&story("First", Priority::Low, Vec::new()), Some(&epic_key))
        .await
        .unwrap();
    assert_eq!(first.summary, "First");
    let types: Vec<String> = tracker
        .requests
        .lock()
        .iter()
        .map(|r| r.issue_type.to_string())
        .collect();
    assert_eq!(types, vec!["Story", "Task"]);

    creator
        .create_story(&story("Second", Priority::Low, Vec::new()), Some(&epic_key))
        .await
        .unwrap();
    let requests = tracker.requests.lock();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[2].issue_type.as_str(), "Task");
    assert_eq!(requests[2].field("customfield_10014"), Some(&string("X-100")));
}

#[tokio::test]
async fn refused_priority_is_dropped_but_the_link_is_kept() {
    let tracker = Arc::new(
        FakeTracker::new()
            .with_metadata(standard_metadata())
            .with_fields(standard_fields())
            .with_rule(|request| {
                request.field("priority").map(|_| {
                    rejection(
                        RejectionKind::UnknownField,
                        "priority",
                        "Field 'priority' cannot be set. It is not on the appropriate screen, or unknown.",
                    )
                })
            }),
    );
    let session = session(&tracker);
    let epic_key = IssueKey::new("X-7").unwrap();

    IssueCreator::new(&session)
        .create_story(&story("Export", Priority::High, Vec::new()), Some(&epic_key))
        .await
        .unwrap();

    let requests = tracker.requests.lock();
    assert_eq!(requests.len(), 2);
    assert!(requests[1].field("priority").is_none());
    assert_eq!(requests[1].field("customfield_10014"), Some(&string("X-7")));
}

#[tokio::test]
async fn refused_assumed_link_field_is_discarded() {
    let tracker = Arc::new(FakeTracker::new().with_rule(|request| {
        request.field("customfield_10014").map(|_| {
            rejection(
                RejectionKind::UnknownField,
                "customfield_10014",
                "Field 'customfield_10014' cannot be set.",
            )
        })
    }));
    let session = session(&tracker);
    let creator = IssueCreator::new(&session);
    let epic_key = IssueKey::new("X-1").unwrap();

    creator
        .create_story(&story("One", Priority::High, Vec::new()), Some(&epic_key))
        .await
        .unwrap();
    assert_eq!(tracker.request_count(), 2);
    assert_eq!(session.cached_schema().unwrap().epic_link_field, None);
    {
        let requests = tracker.requests.lock();
        assert!(requests[1].field("customfield_10014").is_none());
        assert_eq!(requests[1].field("priority"), Some(&json!({"name": "High"})));
    }

    creator
        .create_story(&story("Two", Priority::High, Vec::new()), Some(&epic_key))
        .await
        .unwrap();
    assert_eq!(tracker.request_count(), 3);
    assert_eq!(
        tracker.requests.lock()[2].field("priority"),
        Some(&json!({"name": "High"}))
    );
}

#[tokio::test]
async fn priority_is_dropped_on_the_alternate_type_that_passed_the_type_check() {
    let tracker = Arc::new(
        FakeTracker::new()
            .with_metadata(standard_metadata())
            .with_fields(standard_fields())
            .with_rule(|request| {
                if request.issue_type.as_str() == "Story" {
                    return Some(rejection(
                        RejectionKind::InvalidIssueType,
                        "issuetype",
                        "Specify a valid issue type",
                    ));
                }
                request.field("priority").map(|_| {
                    rejection(
                        RejectionKind::UnknownField,
                        "priority",
                        "Field 'priority' cannot be set.",
                    )
                })
            }),
    );
    let session = session(&tracker);
    let creator = IssueCreator::new(&session);
    let epic_key = IssueKey::new("X-9").unwrap();

    let created = creator
        .create_story(&story("Reports", Priority::High, Vec::new()), Some(&epic_key))
        .await
        .unwrap();
    assert_eq!(created.summary, "Reports");

    {
        let sent: Vec<(String, bool)> = tracker
            .requests
            .lock()
            .iter()
            .map(|r| (r.issue_type.to_string(), r.field("priority").is_some()))
            .collect();
        assert_eq!(
            sent,
            vec![
                ("Story".to_string(), true),
                ("Task".to_string(), true),
                ("Task".to_string(), false),
            ]
        );
        assert_eq!(
            tracker.requests.lock()[2].field("customfield_10014"),
            Some(&string("X-9"))
        );
    }
    assert_eq!(
        session.cached_schema().unwrap().story_issue_type.as_str(),
        "Task"
    );

    creator
        .create_story(&story("Exports", Priority::Low, Vec::new()), Some(&epic_key))
        .await
        .unwrap();
    let requests = tracker.requests.lock();
    assert_eq!(requests.len(), 5);
    assert_eq!(requests[3].issue_type.as_str(), "Task");
    assert!(requests[4].field("priority").is_none());
}

#[tokio::test]
async fn failed_epic_skips_only_its_own_subtree() {
    let tracker = Arc::new(FakeTracker::new().with_rule(|request| {
        (request.summary == "Broken").then(|| {
            rejection(RejectionKind::Other, "", "Workflow forbids creation")
        })
    }));
    let orchestrator = HierarchyOrchestrator::new(session(&tracker));
    let document = RequirementsDocument {
        epics: vec![
            epic(
                "Broken",
                vec![story("Orphan", Priority::Low, vec![subtask("a"), subtask("b")])],
            ),
            epic("Working", vec![story("Kept", Priority::Low, vec![subtask("c")])]),
        ],
    };

    let result = orchestrator
        .materialize(&document, &CancellationToken::new())
        .await;

    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].starts_with("Failed to create epic: Broken ("));
    assert_eq!(result.omitted, 3);
    assert_eq!(result.epics.len(), 1);
    assert_eq!(result.stories.len(), 1);
    assert_eq!(result.subtasks.len(), 1);
    assert_eq!(result.epics[0].summary, "Working");
}

#[tokio::test]
async fn failed_subtask_does_not_stop_its_siblings() {
    let tracker = Arc::new(FakeTracker::new().with_rule(|request| {
        (request.summary == "bad").then(|| {
            rejection(RejectionKind::Other, "", "Summary is too long")
        })
    }));
    let orchestrator = HierarchyOrchestrator::new(session(&tracker));
    let document = RequirementsDocument {
        epics: vec![epic(
            "E",
            vec![story("S", Priority::Low, vec![subtask("bad"), subtask("good")])],
        )],
    };

    let result = orchestrator
        .materialize(&document, &CancellationToken::new())
        .await;

    assert_eq!(
        result.errors,
        vec!["Failed to create subtask: bad (tracker rejected the request: Other: Summary is too long)"]
    );
    assert_eq!(result.subtasks.len(), 1);
    assert_eq!(result.subtasks[0].summary, "good");
    assert_eq!(result.omitted, 0);
}

#[tokio::test]
async fn cancellation_after_the_second_epic_stops_the_walk() {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let tracker = Arc::new(FakeTracker::new().on_created(move |_, key| {
        if key.as_str() == "X-2" {
            trigger.cancel();
        }
    }));
    let orchestrator = HierarchyOrchestrator::new(session(&tracker));

    let result = orchestrator.materialize(&grid(5, 0, 0), &cancel).await;

    assert_eq!(result.epics.len(), 2);
    assert_eq!(result.errors, vec![CANCELLED_MESSAGE.to_string()]);
    assert_eq!(tracker.request_count(), 2);
}

#[tokio::test]
async fn cancellation_keeps_descendants_created_so_far() {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    // Creation order: X-1 epic, X-2 story, X-3 subtask, X-4 subtask.
    let tracker = Arc::new(FakeTracker::new().on_created(move |_, key| {
        if key.as_str() == "X-3" {
            trigger.cancel();
        }
    }));
    let orchestrator = HierarchyOrchestrator::new(session(&tracker));

    let result = orchestrator.materialize(&grid(2, 2, 2), &cancel).await;

    assert_eq!(result.epics.len(), 1);
    assert_eq!(result.stories.len(), 1);
    assert_eq!(result.subtasks.len(), 1);
    assert_eq!(result.errors, vec![CANCELLED_MESSAGE.to_string()]);
    assert_eq!(tracker.request_count(), 3);
}

#[tokio::test]
async fn cancelled_token_creates_nothing() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let tracker = Arc::new(FakeTracker::new());
    let orchestrator = HierarchyOrchestrator::new(session(&tracker));

    let result = orchestrator.materialize(&grid(3, 1, 1), &cancel).await;

    assert_eq!(result.created_count(), 0);
    assert_eq!(result.errors, vec![CANCELLED_MESSAGE.to_string()]);
    assert_eq!(tracker.request_count(), 0);
}
