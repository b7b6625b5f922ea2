use std::time::Duration;

use crate::error::AppError;
use crate::retry::RetryPolicy;
use crate::store::MergePolicy;

const DEFAULT_LANGUAGE: &str = "Malay (Bahasa Malaysia)";
const DEFAULT_TONE: &str = "The translation should have the tone of natural colloquial Malaysian Malay. Make it conversational, simple and friendly, like a friend sharing info, but with no over-the-top slang or shouting.";

/// Tuning for one pipeline run. Read-only once the run starts.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Articles whose rendered content is shorter than this are cleaned out.
    pub min_content_len: usize,
    /// Ask the decision service whether each article is a structured tutorial.
    pub require_tutorial: bool,
    /// Ask the decision service whether each image is relevant to its article.
    pub check_image_relevance: bool,
    pub target_language: String,
    /// Style instruction appended to every translation prompt.
    pub tone: String,
    /// How much article text the decision prompt includes.
    pub decision_excerpt_chars: usize,
    pub merge_policy: MergePolicy,
    pub retry: RetryPolicy,
    /// Fixed pause between consecutive text-service calls.
    pub call_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_content_len: 200,
            require_tutorial: false,
            check_image_relevance: false,
            target_language: DEFAULT_LANGUAGE.to_string(),
            tone: DEFAULT_TONE.to_string(),
            decision_excerpt_chars: 1500,
            merge_policy: MergePolicy::AppendOnly,
            retry: RetryPolicy::default(),
            call_interval: Duration::from_secs(1),
        }
    }
}

impl PipelineConfig {
    pub fn with_min_content_len(mut self, len: usize) -> Self {
        self.min_content_len = len;
        self
    }

    pub fn with_require_tutorial(mut self, enabled: bool) -> Self {
        self.require_tutorial = enabled;
        self
    }

    pub fn with_image_relevance(mut self, enabled: bool) -> Self {
        self.check_image_relevance = enabled;
        self
    }

    pub fn with_target_language(mut self, language: impl Into<String>) -> Self {
        self.target_language = language.into();
        self
    }

    pub fn with_merge_policy(mut self, policy: MergePolicy) -> Self {
        self.merge_policy = policy;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_call_interval(mut self, interval: Duration) -> Self {
        self.call_interval = interval;
        self
    }

    /// Checked once before any stage runs; failure aborts the run.
    pub fn validate(&self) -> Result<(), AppError> {
        self.retry.validate()?;
        if self.target_language.trim().is_empty() {
            return Err(AppError::ConfigError(
                "target language must not be empty".into(),
            ));
        }
        if self.decision_excerpt_chars == 0 {
            return Err(AppError::ConfigError(
                "decision excerpt must be at least 1 character".into(),
            ));
        }
        Ok(())
    }
}
