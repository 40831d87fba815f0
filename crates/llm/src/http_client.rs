//! Shared HTTP client with retry for model providers.

use std::time::Duration;

use pipeline::{LlmError, RetryPolicy};
use reqwest::{header::RETRY_AFTER, Client, RequestBuilder, Response};
use tracing::warn;

/// Retries after the first attempt.
const DEFAULT_MAX_RETRIES: u32 = 3;
/// First back-off; doubles on every retry.
const DEFAULT_BASE_BACKOFF: Duration = Duration::from_secs(1);
/// Default request timeout. Multimodal generation is slow.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);
/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest error-body excerpt kept in an [`LlmError`].
const ERROR_BODY_CHARS: usize = 1_000;

/// HTTP client plus retry policy for model calls.
#[derive(Debug, Clone)]
pub struct LlmHttpClient {
    client: Client,
    pub max_retries: u32,
    pub base_backoff: Duration,
}

impl LlmHttpClient {
    pub fn new(request_timeout: Duration, connect_timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self::from_client(client)
    }

    /// Wraps an existing [`reqwest::Client`].
    pub fn from_client(client: Client) -> Self {
        Self {
            client,
            max_retries: DEFAULT_MAX_RETRIES,
            base_backoff: DEFAULT_BASE_BACKOFF,
        }
    }

    /// Sends the request built by `build_request`, retrying while
    /// [`LlmError::retry_policy`] allows it.
    ///
    /// `build_request` runs once per attempt. A server-provided `Retry-After`
    /// replaces the exponential back-off for that wait. Returns the body of
    /// the first successful response.
    pub async fn execute_with_retry<F>(
        &self,
        request_id: &str,
        body: String,
        build_request: F,
    ) -> Result<String, LlmError>
    where
        F: Fn(&Client, String) -> RequestBuilder,
    {
        let mut retries = 0;
        let mut backoff = self.base_backoff;

        loop {
            let error = match build_request(&self.client, body.clone()).send().await {
                Ok(response) if response.status().is_success() => {
                    return response.text().await.map_err(transport_error);
                }
                Ok(response) => api_error(response).await,
                Err(error) => transport_error(error),
            };

            match error.retry_policy() {
                RetryPolicy::Retryable { after } if retries < self.max_retries => {
                    let wait = after.unwrap_or(backoff);
                    warn!(
                        request_id,
                        %error,
                        retry = retries + 1,
                        wait_ms = wait.as_millis() as u64,
                        "transient model error, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    retries += 1;
                    backoff *= 2;
                }
                _ => return Err(error),
            }
        }
    }
}

impl Default for LlmHttpClient {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_TIMEOUT, DEFAULT_CONNECT_TIMEOUT)
    }
}

fn transport_error(error: reqwest::Error) -> LlmError {
    let connect_or_timeout = error.is_connect() || error.is_timeout();
    // The URL may carry credentials; never echo it.
    LlmError::Transport {
        message: error.without_url().to_string(),
        connect_or_timeout,
    }
}

async fn api_error(response: Response) -> LlmError {
    let status = response.status().as_u16();
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after);
    let body = response.text().await.unwrap_or_default();
    LlmError::Api {
        status,
        message: body.chars().take(ERROR_BODY_CHARS).collect(),
        retry_after,
    }
}

/// Parses a `Retry-After` value given in whole seconds.
///
/// HTTP-date values are ignored; the exponential back-off applies instead.
pub(crate) fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
