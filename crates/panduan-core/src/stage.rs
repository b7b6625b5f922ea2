use std::fmt;
use std::future::Future;

use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{FieldFailure, PipelineBatch};
use crate::traits::PostId;

/// How a stage treats the batch it receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    /// Builds the first batch from source documents.
    Source,
    /// Returns an order-preserving subsequence of its input.
    Filter,
    /// Returns the same articles with fields added or replaced.
    Transform,
    /// Returns its input unchanged after an external side effect.
    Terminal,
}

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Source => "source",
            StageKind::Filter => "filter",
            StageKind::Transform => "transform",
            StageKind::Terminal => "terminal",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What happens to an article when a filter can't reach a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Uncertain {
    Keep,
    Drop,
}

/// A per-article event worth showing the operator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Extraction produced no usable article for this source.
    DocumentSkipped { url: String, reason: String },
    /// A filter stage removed the article.
    ArticleDropped {
        stage: &'static str,
        url: String,
        reason: String,
    },
    /// A filter stage kept the article only because of its uncertainty policy.
    KeptOnUncertainty {
        stage: &'static str,
        url: String,
        reason: String,
    },
    /// A transform stage attached a sentinel to one field.
    FieldFailed {
        stage: &'static str,
        url: String,
        field: &'static str,
        failure: FieldFailure,
    },
    Published { url: String, post_id: PostId },
    PublishFailed { url: String, error: String },
}

/// Collected diagnostics for one run. Every entry is also logged.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, diagnostic: Diagnostic) {
        match &diagnostic {
            Diagnostic::DocumentSkipped { url, reason } => {
                tracing::warn!(%url, %reason, "Document skipped");
            }
            Diagnostic::ArticleDropped { stage, url, reason } => {
                tracing::info!(%stage, %url, %reason, "Article dropped");
            }
            Diagnostic::KeptOnUncertainty { stage, url, reason } => {
                tracing::warn!(%stage, %url, %reason, "Article kept on uncertainty");
            }
            Diagnostic::FieldFailed {
                stage,
                url,
                field,
                failure,
            } => {
                tracing::warn!(%stage, %url, %field, %failure, "Field marked as failed");
            }
            Diagnostic::Published { url, post_id } => {
                tracing::info!(%url, %post_id, "Article published");
            }
            Diagnostic::PublishFailed { url, error } => {
                tracing::warn!(%url, %error, "Publishing failed");
            }
        }
        self.entries.push(diagnostic);
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn published_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|d| matches!(d, Diagnostic::Published { .. }))
            .count()
    }
}

/// Per-run state threaded through every stage.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: Uuid,
    pub diagnostics: Diagnostics,
    /// Articles written by the persist stage in this run.
    pub persisted: usize,
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            diagnostics: Diagnostics::new(),
            persisted: 0,
        }
    }

    pub fn record(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.record(diagnostic);
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

/// A run-aborting stage failure. The batch is handed back, never lost.
#[derive(Debug)]
pub struct StageFailure {
    pub error: AppError,
    pub batch: PipelineBatch,
}

/// The contract every pipeline stage implements.
///
/// Per-article failures are recovered inside the stage and surface only as
/// [`Diagnostic`]s or field sentinels. A stage returns `Err` only for a
/// condition that must abort the run (a store that can't be written).
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    fn kind(&self) -> StageKind;

    fn run(
        &self,
        batch: PipelineBatch,
        ctx: &mut RunContext,
    ) -> impl Future<Output = Result<PipelineBatch, StageFailure>> + Send;
}
