//! Persisted record format and the load-merge-append logic.
//!
//! The record on disk is `{ lastUpdated, articles: [...] }`. Optional
//! fields of a stored article are present only when the stage that
//! produces them succeeded for that article.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Article, ContentBlock, PipelineBatch, Produced};

/// One persisted history entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredArticle {
    pub url: String,
    pub title: String,
    pub content: Vec<ContentBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated_content: Option<Vec<ContentBlock>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_html: Option<String>,
    #[serde(default)]
    pub content_hash: String,
    #[serde(default)]
    pub run_id: Uuid,
    pub saved_at: DateTime<Utc>,
}

impl StoredArticle {
    pub fn from_article(article: &Article, run_id: Uuid, saved_at: DateTime<Utc>) -> Self {
        Self {
            url: article.url.clone(),
            title: article.title.clone(),
            content: article.content.clone(),
            translated_title: success(&article.translated_title),
            translated_content: success(&article.translated_content),
            final_html: success(&article.final_html),
            content_hash: article.content_hash.clone(),
            run_id,
            saved_at,
        }
    }
}

fn success<T: Clone>(field: &Option<Produced<T>>) -> Option<T> {
    field.as_ref().and_then(Produced::value).cloned()
}

/// The whole persisted record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreFile {
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub articles: Vec<StoredArticle>,
}

impl StoreFile {
    /// Entries for one url, newest first.
    pub fn history(&self, url: &str, limit: usize) -> Vec<&StoredArticle> {
        let mut entries: Vec<&StoredArticle> =
            self.articles.iter().filter(|a| a.url == url).collect();
        entries.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
        entries.truncate(limit);
        entries
    }
}

/// How new articles are combined with the persisted history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MergePolicy {
    /// Every run appends; repeated urls accumulate as history.
    #[default]
    AppendOnly,
    /// A new entry replaces any earlier entry with the same url.
    LatestWins,
}

impl MergePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergePolicy::AppendOnly => "append-only",
            MergePolicy::LatestWins => "latest-wins",
        }
    }
}

impl fmt::Display for MergePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MergePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "append-only" | "append" => Ok(MergePolicy::AppendOnly),
            "latest-wins" | "latest" => Ok(MergePolicy::LatestWins),
            _ => Err(format!("Unknown merge policy: {}", s)),
        }
    }
}

/// Merge a new batch into the existing record, stamping each new entry.
pub fn merge(
    mut existing: StoreFile,
    batch: &PipelineBatch,
    policy: MergePolicy,
    run_id: Uuid,
    now: DateTime<Utc>,
) -> StoreFile {
    if policy == MergePolicy::LatestWins {
        existing.articles.retain(|stored| !batch.contains(&stored.url));
    }
    existing.articles.extend(
        batch
            .iter()
            .map(|article| StoredArticle::from_article(article, run_id, now)),
    );
    existing.last_updated = Some(now);
    existing
}
