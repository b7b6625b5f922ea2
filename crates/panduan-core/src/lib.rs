pub mod config;
pub mod error;
pub mod html;
pub mod models;
pub mod pipeline;
pub mod retry;
pub mod stage;
pub mod stages;
pub mod store;
pub mod throttle;
pub mod traits;

#[cfg(test)]
pub mod testutil;

pub use config::PipelineConfig;
pub use error::AppError;
pub use models::{Article, ContentBlock, ExtractedDocument, PipelineBatch, Produced, compute_hash};
pub use pipeline::{Pipeline, PipelineReporter, RunAborted, RunReport, TracingReporter};
pub use retry::{Backoff, CallError, ExternalCaller, RetryPolicy};
pub use stage::{Diagnostic, Stage, StageKind};
pub use store::{MergePolicy, StoreFile, StoredArticle};
pub use traits::{ArticleStore, DocumentExtractor, Fetcher, NullPublisher, PostDraft, Publisher, TextService};
