//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::AppError;
use crate::models::{Article, ContentBlock, ExtractedDocument};
use crate::retry::{Backoff, RetryPolicy};
use crate::store::StoreFile;
use crate::traits::{ArticleStore, DocumentExtractor, Fetcher, PostDraft, PostId, Publisher, TextService};

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Mock fetcher that returns a configurable response.
#[derive(Clone)]
pub struct MockFetcher {
    /// Queue of responses. Each call pops the first element.
    /// If empty, returns a default HTML string.
    responses: Arc<Mutex<Vec<Result<String, AppError>>>>,
    failing_urls: Arc<HashSet<String>>,
}

impl MockFetcher {
    pub fn new(html: &str) -> Self {
        Self::with_responses(vec![Ok(html.to_string())])
    }

    pub fn with_responses(responses: Vec<Result<String, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            failing_urls: Arc::new(HashSet::new()),
        }
    }

    /// Fetches of `url` always fail with a network error.
    pub fn failing_for(mut self, url: &str) -> Self {
        Arc::make_mut(&mut self.failing_urls).insert(url.to_string());
        self
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        if self.failing_urls.contains(url) {
            return Err(AppError::NetworkError(format!("unreachable: {url}")));
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok("<html><body>default</body></html>".to_string())
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockExtractor
// ---------------------------------------------------------------------------

/// Mock extractor keyed by document url. Unknown urls have no title.
#[derive(Clone, Default)]
pub struct MockExtractor {
    documents: Arc<HashMap<String, ExtractedDocument>>,
}

impl MockExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, url: &str, document: ExtractedDocument) -> Self {
        Arc::make_mut(&mut self.documents).insert(url.to_string(), document);
        self
    }
}

impl DocumentExtractor for MockExtractor {
    fn extract(&self, _html: &str, url: &str) -> Result<ExtractedDocument, AppError> {
        self.documents
            .get(url)
            .cloned()
            .ok_or_else(|| AppError::ExtractionError("no <h1> title found".into()))
    }
}

// ---------------------------------------------------------------------------
// MockTextService
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
enum Fallback {
    Reply(fn(&str) -> Result<String, AppError>),
    Fail(fn() -> AppError),
}

/// Mock text service: queued replies first, then a fallback.
#[derive(Clone)]
pub struct MockTextService {
    responses: Arc<Mutex<Vec<Result<String, AppError>>>>,
    fallback: Fallback,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockTextService {
    /// Replies from the queue, then `Ok("default")` once it runs dry.
    pub fn with_responses(responses: Vec<Result<String, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            fallback: Fallback::Reply(|_| Ok("default".to_string())),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Answers every prompt with `reply(prompt)`.
    pub fn replying(reply: fn(&str) -> Result<String, AppError>) -> Self {
        Self {
            fallback: Fallback::Reply(reply),
            ..Self::with_responses(Vec::new())
        }
    }

    /// Fails every call with `error()`.
    pub fn failing(error: fn() -> AppError) -> Self {
        Self {
            fallback: Fallback::Fail(error),
            ..Self::with_responses(Vec::new())
        }
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl TextService for MockTextService {
    async fn complete(&self, prompt: &str) -> Result<String, AppError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let mut responses = self.responses.lock().unwrap();
        if !responses.is_empty() {
            return responses.remove(0);
        }
        match self.fallback {
            Fallback::Reply(reply) => reply(prompt),
            Fallback::Fail(error) => Err(error()),
        }
    }
}

// ---------------------------------------------------------------------------
// MockStore
// ---------------------------------------------------------------------------

/// In-memory store. Loads return the last saved record.
#[derive(Clone, Default)]
pub struct MockStore {
    file: Arc<Mutex<StoreFile>>,
    save_error: Option<fn() -> AppError>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(file: StoreFile) -> Self {
        Self {
            file: Arc::new(Mutex::new(file)),
            save_error: None,
        }
    }

    /// Every save fails with `error()`.
    pub fn with_save_error(mut self, error: fn() -> AppError) -> Self {
        self.save_error = Some(error);
        self
    }

    pub fn snapshot(&self) -> StoreFile {
        self.file.lock().unwrap().clone()
    }
}

impl ArticleStore for MockStore {
    fn load(&self) -> Result<StoreFile, AppError> {
        Ok(self.snapshot())
    }

    fn save(&self, file: &StoreFile) -> Result<(), AppError> {
        if let Some(error) = self.save_error {
            return Err(error());
        }
        *self.file.lock().unwrap() = file.clone();
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

// ---------------------------------------------------------------------------
// MockPublisher
// ---------------------------------------------------------------------------

/// Records every draft; fails for selected source urls.
#[derive(Clone, Default)]
pub struct MockPublisher {
    drafts: Arc<Mutex<Vec<PostDraft>>>,
    failing_urls: Arc<HashSet<String>>,
}

impl MockPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(mut self, url: &str) -> Self {
        Arc::make_mut(&mut self.failing_urls).insert(url.to_string());
        self
    }

    pub fn drafts(&self) -> Vec<PostDraft> {
        self.drafts.lock().unwrap().clone()
    }
}

impl Publisher for MockPublisher {
    async fn publish(&self, draft: &PostDraft) -> Result<PostId, AppError> {
        let mut drafts = self.drafts.lock().unwrap();
        drafts.push(draft.clone());
        if self.failing_urls.contains(&draft.source_url) {
            return Err(AppError::PublishError {
                message: "rest_cannot_create".into(),
                status_code: 403,
            });
        }
        Ok(100 + drafts.len() as PostId)
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Retry policy with no backoff delay.
pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::default()
        .with_max_attempts(max_attempts)
        .with_backoff(Backoff::Fixed(Duration::ZERO))
}

/// A document long enough to pass the default cleaning threshold.
pub fn sample_document(url: &str, with_image: bool) -> ExtractedDocument {
    let mut blocks = vec![
        ContentBlock::Heading {
            level: 2,
            text: "Before you start".into(),
        },
        ContentBlock::Paragraph {
            text: "Open the settings page of your phone and scroll down until you find the \
                   section called Network. Make sure mobile data is switched on."
                .into(),
        },
    ];
    if with_image {
        blocks.push(ContentBlock::Image {
            src: format!("{url}.png"),
            alt: "settings screen".into(),
        });
    }
    blocks.push(ContentBlock::Paragraph {
        text: "Tap Save and restart the device. The new settings are applied after the restart."
            .into(),
    });
    ExtractedDocument {
        title: format!("Article {url}"),
        blocks,
    }
}

pub fn sample_article(url: &str, with_image: bool) -> Article {
    Article::new(url, sample_document(url, with_image))
}

/// An article with a single paragraph of `text`.
pub fn text_article(url: &str, text: &str) -> Article {
    Article::new(
        url,
        ExtractedDocument {
            title: format!("Article {url}"),
            blocks: vec![ContentBlock::Paragraph { text: text.into() }],
        },
    )
}

/// The text a prompt carries after its instructions.
pub fn prompt_payload(prompt: &str) -> &str {
    prompt.rsplit("\n\n").next().unwrap_or(prompt)
}
