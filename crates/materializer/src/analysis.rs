//! Requirements analysis: prompt, model call, extraction.

use std::sync::Arc;

use pipeline::{
    build_prompt, extract_document, DocumentStats, LlmProvider, PipelineError,
    RequirementsDocument, RequirementsInput, ResponsePreview, DEFAULT_EXTRACTION_PROMPT,
};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

/// A parsed document together with its item counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Analysis {
    pub document: RequirementsDocument,
    pub stats: DocumentStats,
}

/// Turns requirements text and diagrams into a [`RequirementsDocument`].
pub struct Analyzer {
    llm: Arc<dyn LlmProvider>,
    default_prompt: String,
}

impl Analyzer {
    /// An analyzer using the built-in extraction prompt.
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            default_prompt: DEFAULT_EXTRACTION_PROMPT.to_string(),
        }
    }

    /// Replaces the process-wide default prompt. Blank values are ignored.
    #[must_use]
    pub fn with_default_prompt(mut self, prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        if !prompt.trim().is_empty() {
            self.default_prompt = prompt;
        }
        self
    }

    /// Sends `input` to the model and parses the reply.
    ///
    /// `custom_prompt` overrides the default prompt for this call only.
    #[instrument(
        skip(self, input, custom_prompt),
        fields(model = %self.llm.model_name(), images = input.images.len())
    )]
    pub async fn analyze(
        &self,
        input: &RequirementsInput,
        custom_prompt: Option<&str>,
    ) -> Result<Analysis, PipelineError> {
        if input.is_empty() {
            return Err(PipelineError::NoRequirements);
        }

        let prompt = build_prompt(&self.default_prompt, custom_prompt, input);
        debug!(prompt_chars = prompt.len(), "sending requirements to model");
        let raw = self.llm.generate(&prompt, &input.images).await?;

        let document = extract_document(&raw).map_err(|error| {
            warn!(preview = %ResponsePreview::of(&raw), "model response could not be parsed");
            error
        })?;

        let mut stats = document.stats();
        stats.images_processed = input.images.len();
        info!(
            epics = stats.epics,
            stories = stats.stories,
            subtasks = stats.subtasks,
            "requirements analysed"
        );
        Ok(Analysis { document, stats })
    }
}
