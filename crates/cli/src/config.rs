//! Command-line and environment configuration.
//!
//! Every value may come from a flag or its environment variable (a `.env`
//! file is loaded first). Tracker and model settings stay optional here so
//! missing credentials surface as a `NotConfigured` report or a configuration
//! error, not as an argument-parsing failure.

use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use jira::{JiraClient, JiraConfig};
use llm::GeminiProvider;
use materializer::{Analyzer, TrackerSession};
use pipeline::{FieldId, IssueTypeName, PipelineError, ProjectKey, TrackerSettings};

#[derive(Debug, Clone, Default, Args)]
pub struct TrackerArgs {
    /// Jira base URL, e.g. https://acme.atlassian.net
    #[arg(long, env = "JIRA_URL")]
    pub jira_url: Option<String>,

    #[arg(long, env = "JIRA_EMAIL")]
    pub jira_email: Option<String>,

    #[arg(long, env = "JIRA_API_TOKEN", hide_env_values = true)]
    pub jira_api_token: Option<String>,

    #[arg(long, env = "JIRA_PROJECT_KEY")]
    pub project_key: Option<String>,

    #[arg(long, env = "JIRA_EPIC_ISSUE_TYPE")]
    pub epic_issue_type: Option<String>,

    #[arg(long, env = "JIRA_STORY_ISSUE_TYPE")]
    pub story_issue_type: Option<String>,

    #[arg(long, env = "JIRA_SUBTASK_ISSUE_TYPE")]
    pub subtask_issue_type: Option<String>,

    /// Pins the Epic-Name field, skipping detection.
    #[arg(long, env = "JIRA_EPIC_NAME_FIELD")]
    pub epic_name_field: Option<String>,

    /// Pins the Epic-Link field, skipping detection.
    #[arg(long, env = "JIRA_EPIC_LINK_FIELD")]
    pub epic_link_field: Option<String>,

    /// Tracker request timeout in seconds.
    #[arg(long, env = "JIRA_TIMEOUT_SECS", default_value_t = 30)]
    pub jira_timeout_secs: u64,
}

impl TrackerArgs {
    /// Validates the settings without touching the network.
    pub fn settings(&self) -> Result<TrackerSettings, PipelineError> {
        let project_key = self
            .project_key
            .as_deref()
            .and_then(ProjectKey::new)
            .ok_or_else(|| PipelineError::configuration("JIRA_PROJECT_KEY is not set"))?;

        let mut settings = TrackerSettings::new(project_key);
        if let Some(name) = non_blank(&self.epic_issue_type).and_then(IssueTypeName::new) {
            settings.epic_issue_type = name;
        }
        if let Some(name) = non_blank(&self.story_issue_type).and_then(IssueTypeName::new) {
            settings.story_issue_type = name;
        }
        if let Some(name) = non_blank(&self.subtask_issue_type).and_then(IssueTypeName::new) {
            settings.subtask_issue_type = name;
        }
        settings.epic_name_field = non_blank(&self.epic_name_field).and_then(FieldId::new);
        settings.epic_link_field = non_blank(&self.epic_link_field).and_then(FieldId::new);
        Ok(settings)
    }

    pub fn jira_config(&self) -> Result<JiraConfig, PipelineError> {
        let config = JiraConfig::new(
            self.jira_url.as_deref().unwrap_or_default(),
            self.jira_email.as_deref().unwrap_or_default(),
            self.jira_api_token.as_deref().unwrap_or_default(),
        )?;
        Ok(config.with_timeout(Duration::from_secs(self.jira_timeout_secs)))
    }

    /// A live tracker session, or the reason the tracker is not configured.
    pub fn session(&self) -> Result<Arc<TrackerSession>, PipelineError> {
        let client = JiraClient::new(self.jira_config()?)?;
        Ok(Arc::new(TrackerSession::new(
            Arc::new(client),
            self.settings()?,
        )))
    }
}

#[derive(Debug, Clone, Default, Args)]
pub struct ModelArgs {
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    pub google_api_key: Option<String>,

    #[arg(long, env = "GEMINI_MODEL")]
    pub gemini_model: Option<String>,

    /// Replaces the built-in extraction prompt for every request.
    #[arg(long, env = "SYSTEM_PROMPT", hide_env_values = true)]
    pub system_prompt: Option<String>,
}

impl ModelArgs {
    pub fn analyzer(&self) -> Result<Analyzer, PipelineError> {
        let mut provider = GeminiProvider::new(self.google_api_key.clone().unwrap_or_default())?;
        if let Some(model) = non_blank(&self.gemini_model) {
            provider = provider.with_model(model);
        }
        let mut analyzer = Analyzer::new(Arc::new(provider));
        if let Some(prompt) = non_blank(&self.system_prompt) {
            analyzer = analyzer.with_default_prompt(prompt);
        }
        Ok(analyzer)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
