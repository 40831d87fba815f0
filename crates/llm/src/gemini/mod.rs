//! Google Gemini provider.

mod types;

use async_trait::async_trait;
use pipeline::{ImagePayload, LlmError, LlmProvider, PipelineError};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::http_client::{LlmHttpClient, DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT};
use types::{GenerateContentRequest, GenerateContentResponse};

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Gemini `generateContent` client.
///
/// Each [`generate`](LlmProvider::generate) call is one user turn holding the
/// prompt and every image. Transient failures are retried by
/// [`LlmHttpClient`]; the API key travels as a query parameter and is never
/// logged.
#[derive(Clone)]
pub struct GeminiProvider {
    api_key: String,
    model: String,
    api_base: String,
    http: LlmHttpClient,
}

impl GeminiProvider {
    /// Fails with a configuration error if `api_key` is blank.
    pub fn new(api_key: impl Into<String>) -> Result<Self, PipelineError> {
        let api_key = api_key.into().trim().to_string();
        if api_key.is_empty() {
            return Err(PipelineError::configuration("GOOGLE_API_KEY is not set"));
        }
        Ok(Self {
            api_key,
            model: DEFAULT_MODEL.to_string(),
            api_base: GEMINI_API_BASE.to_string(),
            http: LlmHttpClient::new(DEFAULT_REQUEST_TIMEOUT, DEFAULT_CONNECT_TIMEOUT),
        })
    }

    /// Blank names keep the current model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        if !model.trim().is_empty() {
            self.model = model.trim().to_string();
        }
        self
    }

    pub fn with_http_client(mut self, http: LlmHttpClient) -> Self {
        self.http = http;
        self
    }

    /// Points the provider at another endpoint, e.g. a proxy.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/{}:generateContent", self.api_base, self.model)
    }
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    #[instrument(
        skip(self, prompt, images),
        fields(request_id, model = %self.model, images = images.len())
    )]
    async fn generate(&self, prompt: &str, images: &[ImagePayload]) -> Result<String, LlmError> {
        let request_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("request_id", request_id.as_str());

        let body = serde_json::to_string(&GenerateContentRequest::user_turn(prompt, images))
            .map_err(|e| LlmError::InvalidResponse {
                message: format!("cannot encode request: {e}"),
            })?;
        debug!(bytes = body.len(), "sending generation request");

        let url = self.endpoint();
        let response = self
            .http
            .execute_with_retry(&request_id, body, |client, body| {
                client
                    .post(&url)
                    .query(&[("key", self.api_key.as_str())])
                    .header(reqwest::header::CONTENT_TYPE, "application/json")
                    .body(body)
            })
            .await?;

        let parsed: GenerateContentResponse =
            serde_json::from_str(&response).map_err(|e| LlmError::InvalidResponse {
                message: e.to_string(),
            })?;
        let text = parsed.into_text()?;
        debug!(chars = text.len(), "received generation response");
        Ok(text)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
