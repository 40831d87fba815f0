//! Jira REST v2 request and response bodies.

use std::collections::BTreeMap;

use pipeline::{
    FieldDefinition, IssueKey, IssueReceipt, IssueRequest, IssueTypeInfo, IssueTypeMeta,
    IssueTypeName,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

// ---------------------------------------------------------------------------
// Create issue
// ---------------------------------------------------------------------------

/// `POST /rest/api/2/issue` body.
#[derive(Debug, Serialize)]
pub(crate) struct CreateIssueBody {
    pub fields: Map<String, Value>,
}

impl From<&IssueRequest> for CreateIssueBody {
    fn from(request: &IssueRequest) -> Self {
        let mut fields = Map::new();
        fields.insert("project".into(), json!({ "key": request.project.as_str() }));
        fields.insert("summary".into(), Value::String(request.summary.clone()));
        fields.insert(
            "description".into(),
            Value::String(request.description.clone()),
        );
        fields.insert(
            "issuetype".into(),
            json!({ "name": request.issue_type.as_str() }),
        );
        for (id, value) in &request.fields {
            fields.insert(id.clone(), value.clone());
        }
        Self { fields }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreatedIssueBody {
    pub key: String,
    #[serde(rename = "self", default)]
    pub self_url: String,
}

impl CreatedIssueBody {
    pub fn into_receipt(self) -> Option<IssueReceipt> {
        Some(IssueReceipt {
            key: IssueKey::new(self.key)?,
            self_url: self.self_url,
        })
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error body Jira returns with 4xx responses.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub error_messages: Vec<String>,
    #[serde(default)]
    pub errors: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// Fields
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub(crate) struct FieldSchema {
    #[serde(default)]
    pub custom: Option<String>,
}

/// An entry of `GET /rest/api/2/field`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FieldBody {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub custom: bool,
    #[serde(default)]
    pub clause_names: Vec<String>,
    #[serde(default)]
    pub schema: Option<FieldSchema>,
}

impl From<FieldBody> for FieldDefinition {
    fn from(body: FieldBody) -> Self {
        Self {
            id: body.id,
            name: body.name,
            custom: body.custom,
            clause_names: body.clause_names,
            custom_type: body.schema.and_then(|s| s.custom),
        }
    }
}

/// A field as described inside create metadata, keyed by its identifier.
#[derive(Debug, Deserialize)]
pub(crate) struct MetaFieldBody {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub schema: Option<FieldSchema>,
}

// ---------------------------------------------------------------------------
// Create metadata
// ---------------------------------------------------------------------------

/// `GET /rest/api/2/issue/createmeta` response.
#[derive(Debug, Deserialize)]
pub(crate) struct CreateMetaBody {
    #[serde(default)]
    pub projects: Vec<ProjectMetaBody>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProjectMetaBody {
    #[serde(default)]
    pub issuetypes: Vec<IssueTypeBody>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IssueTypeBody {
    pub name: String,
    #[serde(default)]
    pub subtask: bool,
    #[serde(default)]
    pub fields: BTreeMap<String, MetaFieldBody>,
}

impl CreateMetaBody {
    /// Flattens every project's issue types. Types with blank names are dropped.
    pub fn into_metadata(self) -> Vec<IssueTypeMeta> {
        self.projects
            .into_iter()
            .flat_map(|p| p.issuetypes)
            .filter_map(|t| {
                let name = IssueTypeName::new(t.name)?;
                let fields = t
                    .fields
                    .into_iter()
                    .map(|(id, field)| FieldDefinition {
                        custom: id.starts_with("customfield_"),
                        id,
                        name: field.name,
                        clause_names: Vec::new(),
                        custom_type: field.schema.and_then(|s| s.custom),
                    })
                    .collect();
                Some(IssueTypeMeta {
                    issue_type: IssueTypeInfo {
                        name,
                        subtask: t.subtask,
                    },
                    fields,
                })
            })
            .collect()
    }
}
