//! [`IssueTracker`] over the Jira REST v2 API.

use async_trait::async_trait;
use pipeline::{
    FieldDefinition, IssueReceipt, IssueRequest, IssueTracker, IssueTypeMeta, IssueTypeName,
    PipelineError, ProjectKey, TrackerError,
};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::config::{JiraConfig, CONNECT_TIMEOUT};
use crate::rejection::classify_rejection;
use crate::wire::{CreateIssueBody, CreateMetaBody, CreatedIssueBody, FieldBody};

const ISSUE_PATH: &str = "rest/api/2/issue";
const FIELD_PATH: &str = "rest/api/2/field";
const CREATE_META_PATH: &str = "rest/api/2/issue/createmeta";
const CREATE_META_EXPAND: &str = "projects.issuetypes.fields";

/// Longest response excerpt carried in an error.
const ERROR_BODY_CHARS: usize = 500;

/// A Jira connection.
///
/// Every method makes exactly one HTTP request and never retries.
#[derive(Debug, Clone)]
pub struct JiraClient {
    http: Client,
    config: JiraConfig,
}

impl JiraClient {
    /// Builds a client with the configured timeouts.
    pub fn new(config: JiraConfig) -> Result<Self, PipelineError> {
        let http = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| PipelineError::configuration(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    /// Builds a client around an existing [`reqwest::Client`].
    pub fn with_http_client(config: JiraConfig, http: Client) -> Self {
        Self { http, config }
    }

    pub fn config(&self) -> &JiraConfig {
        &self.config
    }

    fn url(&self, path: &str) -> Result<Url, TrackerError> {
        self.config
            .base_url()
            .join(path)
            .map_err(|e| TrackerError::Transport {
                message: format!("invalid tracker URL: {e}"),
            })
    }

    fn authorised(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .basic_auth(self.config.email(), Some(self.config.api_token()))
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, TrackerError> {
        self.authorised(request)
            .send()
            .await
            .map_err(|e| TrackerError::Transport {
                message: e.to_string(),
            })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, TrackerError> {
        let response = check_status(self.send(request).await?).await?;
        decode(response).await
    }
}

#[async_trait]
impl IssueTracker for JiraClient {
    #[instrument(skip_all, fields(issue_type = %request.issue_type, summary = %request.summary))]
    async fn create_issue(&self, request: &IssueRequest) -> Result<IssueReceipt, TrackerError> {
        let body = CreateIssueBody::from(request);
        let response = self
            .send(self.http.post(self.url(ISSUE_PATH)?).json(&body))
            .await?;
        let response = check_status(response).await?;
        let created: CreatedIssueBody = decode(response).await?;
        created
            .into_receipt()
            .ok_or_else(|| TrackerError::InvalidResponse {
                message: "created issue has a blank key".to_string(),
            })
    }

    #[instrument(skip_all)]
    async fn list_fields(&self) -> Result<Vec<FieldDefinition>, TrackerError> {
        let fields: Vec<FieldBody> = self.get_json(self.http.get(self.url(FIELD_PATH)?)).await?;
        debug!(count = fields.len(), "listed tracker fields");
        Ok(fields.into_iter().map(FieldDefinition::from).collect())
    }

    #[instrument(skip_all, fields(%project, issue_type = ?issue_type.map(IssueTypeName::as_str)))]
    async fn create_metadata(
        &self,
        project: &ProjectKey,
        issue_type: Option<&IssueTypeName>,
    ) -> Result<Vec<IssueTypeMeta>, TrackerError> {
        let mut query = vec![
            ("projectKeys", project.as_str()),
            ("expand", CREATE_META_EXPAND),
        ];
        if let Some(name) = issue_type {
            query.push(("issuetypeNames", name.as_str()));
        }
        let body: CreateMetaBody = self
            .get_json(self.http.get(self.url(CREATE_META_PATH)?).query(&query))
            .await?;
        Ok(body.into_metadata())
    }
}

/// Maps non-success statuses onto [`TrackerError`].
async fn check_status(response: Response) -> Result<Response, TrackerError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, &body))
}

pub(crate) fn status_error(status: StatusCode, body: &str) -> TrackerError {
    match status {
        StatusCode::BAD_REQUEST => {
            let rejection = classify_rejection(body);
            warn!(kind = ?rejection.kind, fields = ?rejection.fields, "tracker rejected request");
            TrackerError::Rejected(rejection)
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TrackerError::Unauthorized {
            status: status.as_u16(),
        },
        _ => TrackerError::Http {
            status: status.as_u16(),
            message: body.chars().take(ERROR_BODY_CHARS).collect(),
        },
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, TrackerError> {
    let text = response.text().await.map_err(|e| TrackerError::Transport {
        message: e.to_string(),
    })?;
    serde_json::from_str(&text).map_err(|e| TrackerError::InvalidResponse {
        message: e.to_string(),
    })
}
