//! Connection settings for a Jira instance.

use std::time::Duration;

use pipeline::PipelineError;
use reqwest::Url;

/// Default request timeout for tracker calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connect timeout for tracker calls.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Validated Jira connection settings.
///
/// Construction is the "is the tracker configured?" check: it fails with
/// [`PipelineError::Configuration`] before any network call is made.
#[derive(Clone)]
pub struct JiraConfig {
    base_url: Url,
    email: String,
    api_token: String,
    timeout: Duration,
}

impl JiraConfig {
    /// Validates and builds the settings.
    ///
    /// Every value must be non-blank and `url` must be an absolute `http` or
    /// `https` URL.
    pub fn new(url: &str, email: &str, api_token: &str) -> Result<Self, PipelineError> {
        let url = require("JIRA_URL", url)?;
        let email = require("JIRA_EMAIL", email)?;
        let api_token = require("JIRA_API_TOKEN", api_token)?;

        // A trailing slash makes `Url::join` treat the base as a directory.
        let normalised = format!("{}/", url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| {
            PipelineError::configuration(format!("JIRA_URL is not a valid URL: {e}"))
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(PipelineError::configuration(format!(
                "JIRA_URL must use http or https, got '{}'",
                base_url.scheme()
            )));
        }

        Ok(Self {
            base_url,
            email: email.to_string(),
            api_token: api_token.to_string(),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Overrides the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Base URL, always ending in `/`.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub(crate) fn api_token(&self) -> &str {
        &self.api_token
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl std::fmt::Debug for JiraConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JiraConfig")
            .field("base_url", &self.base_url.as_str())
            .field("email", &self.email)
            .field("api_token", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn require<'a>(name: &str, value: &'a str) -> Result<&'a str, PipelineError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(PipelineError::configuration(format!("{name} is not set")))
    } else {
        Ok(trimmed)
    }
}
