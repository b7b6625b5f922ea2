use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::html::render_blocks;

/// One typed unit of extracted content.
///
/// The order of blocks produced by extraction is the reading order and is
/// preserved by every stage that rewrites text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Heading { level: u8, text: String },
    Paragraph { text: String },
    List { ordered: bool, items: Vec<String> },
    Quote { text: String },
    Code { text: String },
    Image { src: String, alt: String },
}

impl ContentBlock {
    pub fn is_image(&self) -> bool {
        matches!(self, ContentBlock::Image { .. })
    }

    /// Text payloads carried by this block, in order. Images carry none.
    pub fn texts(&self) -> Vec<&str> {
        match self {
            ContentBlock::Heading { text, .. }
            | ContentBlock::Paragraph { text }
            | ContentBlock::Quote { text }
            | ContentBlock::Code { text } => vec![text.as_str()],
            ContentBlock::List { items, .. } => items.iter().map(String::as_str).collect(),
            ContentBlock::Image { .. } => Vec::new(),
        }
    }

    /// Plain text of the block, list items joined by newlines.
    pub fn plain_text(&self) -> String {
        self.texts().join("\n")
    }
}

/// Title plus ordered blocks, as produced from one source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedDocument {
    pub title: String,
    pub blocks: Vec<ContentBlock>,
}

/// Why a derived field could not be produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The service stayed unavailable for the whole retry budget.
    Unavailable,
    /// The service refused the request (non-retryable).
    Rejected,
    /// An upstream field this one depends on is missing or failed.
    MissingInput,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Unavailable => write!(f, "unavailable"),
            FailureKind::Rejected => write!(f, "rejected"),
            FailureKind::MissingInput => write!(f, "missing input"),
        }
    }
}

/// Sentinel failure value attached to a field instead of raising.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl FieldFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// A field produced by a transform stage: either the value or a sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Produced<T> {
    Value(T),
    Failed(FieldFailure),
}

impl<T> Produced<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Produced::Value(v) => Some(v),
            Produced::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&FieldFailure> {
        match self {
            Produced::Value(_) => None,
            Produced::Failed(f) => Some(f),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Produced::Failed(_))
    }
}

/// The unit of work flowing through the pipeline.
///
/// Created by extraction, enriched by transform stages, removed only by
/// filter stages. `url` never changes and is the merge key for history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub url: String,
    pub title: String,
    pub content: Vec<ContentBlock>,
    /// SHA-256 of the rendered `content`. Use [`Article::set_content`] to
    /// keep the two in step.
    pub content_hash: String,
    pub translated_title: Option<Produced<String>>,
    pub translated_content: Option<Produced<Vec<ContentBlock>>>,
    pub final_html: Option<Produced<String>>,
}

impl Article {
    pub fn new(url: impl Into<String>, document: ExtractedDocument) -> Self {
        let content_hash = compute_hash(&render_blocks(&document.blocks));
        Self {
            url: url.into(),
            title: document.title,
            content: document.blocks,
            content_hash,
            translated_title: None,
            translated_content: None,
            final_html: None,
        }
    }

    pub fn image_count(&self) -> usize {
        self.content.iter().filter(|b| b.is_image()).count()
    }

    pub fn has_image(&self) -> bool {
        self.content.iter().any(ContentBlock::is_image)
    }

    /// Replace the original content and recompute its hash.
    pub fn set_content(&mut self, blocks: Vec<ContentBlock>) {
        self.content_hash = compute_hash(&render_blocks(&blocks));
        self.content = blocks;
    }

    /// First image reference in reading order, used as featured media.
    pub fn first_image(&self) -> Option<&str> {
        self.content.iter().find_map(|b| match b {
            ContentBlock::Image { src, .. } => Some(src.as_str()),
            _ => None,
        })
    }

    /// Translated title if available, otherwise the original.
    pub fn display_title(&self) -> &str {
        self.translated_title
            .as_ref()
            .and_then(Produced::value)
            .map(String::as_str)
            .unwrap_or(&self.title)
    }
}

/// Ordered set of articles handed between stages. Urls are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PipelineBatch {
    articles: Vec<Article>,
}

impl PipelineBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an article unless its url is already present.
    ///
    /// Returns the article back when it was rejected as a duplicate.
    pub fn try_push(&mut self, article: Article) -> Result<(), Article> {
        if self.contains(&article.url) {
            return Err(article);
        }
        self.articles.push(article);
        Ok(())
    }

    pub fn contains(&self, url: &str) -> bool {
        self.articles.iter().any(|a| a.url == url)
    }

    pub fn len(&self) -> usize {
        self.articles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Article> {
        self.articles.iter()
    }

    pub fn urls(&self) -> Vec<&str> {
        self.articles.iter().map(|a| a.url.as_str()).collect()
    }

    pub fn as_slice(&self) -> &[Article] {
        &self.articles
    }
}

impl IntoIterator for PipelineBatch {
    type Item = Article;
    type IntoIter = std::vec::IntoIter<Article>;

    fn into_iter(self) -> Self::IntoIter {
        self.articles.into_iter()
    }
}

impl<'a> IntoIterator for &'a PipelineBatch {
    type Item = &'a Article;
    type IntoIter = std::slice::Iter<'a, Article>;

    fn into_iter(self) -> Self::IntoIter {
        self.articles.iter()
    }
}

/// Builds a batch, keeping the first article for any repeated url.
impl FromIterator<Article> for PipelineBatch {
    fn from_iter<I: IntoIterator<Item = Article>>(iter: I) -> Self {
        let mut seen = HashSet::new();
        let articles = iter
            .into_iter()
            .filter(|a| seen.insert(a.url.clone()))
            .collect();
        Self { articles }
    }
}

/// Compute a SHA-256 hash of a string, returned as 64-char hex.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
