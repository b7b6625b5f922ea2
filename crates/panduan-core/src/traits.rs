use std::future::Future;

use serde::Serialize;

use crate::error::AppError;
use crate::models::ExtractedDocument;
use crate::store::StoreFile;

/// Fetches raw (possibly browser-rendered) HTML from a URL.
pub trait Fetcher: Send + Sync + Clone {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Turns a document's HTML into a title and ordered content blocks.
pub trait DocumentExtractor: Send + Sync + Clone {
    /// `url` is the document's own address, used to resolve media references.
    fn extract(&self, html: &str, url: &str) -> Result<ExtractedDocument, AppError>;
}

/// An unreliable external text service (translation, decisions, relevance).
///
/// Only ever called through [`crate::retry::ExternalCaller`]. An empty reply
/// is `Ok(String::new())`, never an error.
pub trait TextService: Send + Sync + Clone {
    fn complete(&self, prompt: &str) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Loads and saves the persisted article history.
pub trait ArticleStore: Send + Sync + Clone {
    /// Load the persisted record. A store that does not exist yet is empty.
    fn load(&self) -> Result<StoreFile, AppError>;

    /// Replace the persisted record. Must never leave a truncated store.
    fn save(&self, file: &StoreFile) -> Result<(), AppError>;

    /// Human-readable location, for diagnostics.
    fn location(&self) -> String;
}

/// A post to create on the publishing target.
#[derive(Debug, Clone, Serialize)]
pub struct PostDraft {
    pub title: String,
    pub html: String,
    pub source_url: String,
    pub media: Option<String>,
}

/// Identifier assigned by the publishing target.
pub type PostId = u64;

/// Publishes one article to the content-management system.
pub trait Publisher: Send + Sync + Clone {
    fn publish(&self, draft: &PostDraft) -> impl Future<Output = Result<PostId, AppError>> + Send;
}

/// A no-op Publisher for runs that do not publish.
#[derive(Debug, Clone)]
pub struct NullPublisher;

impl Publisher for NullPublisher {
    async fn publish(&self, _draft: &PostDraft) -> Result<PostId, AppError> {
        Ok(0)
    }
}
