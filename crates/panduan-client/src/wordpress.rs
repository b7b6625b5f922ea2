//! WordPress REST publisher: every article becomes a draft post.

use std::time::Duration;

use panduan_core::error::AppError;
use panduan_core::traits::{PostDraft, PostId, Publisher};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::fetcher::{USER_AGENT, ensure_public_url, request_error};

const TIMEOUT: Duration = Duration::from_secs(60);

/// Publishing target and credentials.
#[derive(Debug, Clone)]
pub struct WordPressConfig {
    pub base_url: String,
    pub user: String,
    /// Application password (not the account password).
    pub app_password: String,
    /// Category name, resolved to an id on connect.
    pub category: String,
    pub tags: Vec<u64>,
}

impl WordPressConfig {
    /// Read configuration from environment variables.
    ///
    /// - `WORDPRESS_URL`, `WORDPRESS_USER`, `WORDPRESS_APP_PASS`,
    ///   `WORDPRESS_CATEGORY` (required)
    /// - `WORDPRESS_TAGS` (optional, comma-separated tag ids)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let required = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| {
                    AppError::ConfigError(format!("{key} not set. Required for publishing."))
                })
        };

        let base_url = required("WORDPRESS_URL")?;
        Url::parse(&base_url)
            .map_err(|e| AppError::ConfigError(format!("Invalid WORDPRESS_URL '{base_url}': {e}")))?;

        let tags = match lookup("WORDPRESS_TAGS") {
            Some(raw) => parse_tags(&raw)?,
            None => Vec::new(),
        };

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            user: required("WORDPRESS_USER")?,
            app_password: required("WORDPRESS_APP_PASS")?,
            category: required("WORDPRESS_CATEGORY")?,
            tags,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/wp-json/wp/v2/{path}", self.base_url)
    }
}

fn parse_tags(raw: &str) -> Result<Vec<u64>, AppError> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| {
            t.parse().map_err(|_| {
                AppError::ConfigError(format!("Invalid WORDPRESS_TAGS entry '{t}': must be a tag id"))
            })
        })
        .collect()
}

#[derive(Deserialize)]
struct Category {
    id: u64,
    name: String,
}

#[derive(Deserialize)]
struct Created {
    id: u64,
}

#[derive(Serialize)]
struct PostRequest<'a> {
    title: &'a str,
    content: &'a str,
    status: &'static str,
    categories: [u64; 1],
    #[serde(skip_serializing_if = "<[u64]>::is_empty")]
    tags: &'a [u64],
    #[serde(skip_serializing_if = "Option::is_none")]
    featured_media: Option<u64>,
}

/// Creates draft posts through the WordPress REST API (basic auth with an
/// application password).
#[derive(Clone)]
pub struct WordPressPublisher {
    client: Client,
    config: WordPressConfig,
    category_id: u64,
}

impl WordPressPublisher {
    /// Resolve the configured category once. An unknown category is a
    /// configuration error, raised before any article is processed.
    pub async fn connect(config: WordPressConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(TIMEOUT)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        let mut url = Url::parse(&config.endpoint("categories"))
            .map_err(|e| AppError::ConfigError(format!("Invalid WORDPRESS_URL: {e}")))?;
        url.query_pairs_mut().append_pair("search", &config.category);

        let response = client
            .get(url)
            .basic_auth(&config.user, Some(&config.app_password))
            .send()
            .await
            .map_err(|e| request_error(e, TIMEOUT))?;
        let categories: Vec<Category> = json_or_error(response).await?;

        let category_id = pick_category(&categories, &config.category).ok_or_else(|| {
            AppError::ConfigError(format!("WordPress category '{}' not found", config.category))
        })?;
        tracing::info!(category = %config.category, category_id, "Resolved WordPress category");

        Ok(Self {
            client,
            config,
            category_id,
        })
    }

    pub fn category_id(&self) -> u64 {
        self.category_id
    }

    /// Download the image at `src` and upload it to the media library.
    async fn upload_media(&self, src: &str) -> Result<u64, AppError> {
        ensure_public_url(src).await?;
        let image = self
            .client
            .get(src)
            .send()
            .await
            .map_err(|e| request_error(e, TIMEOUT))?;
        if !image.status().is_success() {
            return Err(AppError::HttpError(format!(
                "HTTP {} downloading {src}",
                image.status().as_u16()
            )));
        }
        let content_type = image
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/jpeg")
            .to_string();
        let bytes = image
            .bytes()
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to read {src}: {e}")))?;

        let response = self
            .client
            .post(self.config.endpoint("media"))
            .basic_auth(&self.config.user, Some(&self.config.app_password))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header(
                reqwest::header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", media_filename(src)),
            )
            .body(bytes)
            .send()
            .await
            .map_err(|e| request_error(e, TIMEOUT))?;
        let created: Created = json_or_error(response).await?;
        Ok(created.id)
    }
}

impl Publisher for WordPressPublisher {
    async fn publish(&self, draft: &PostDraft) -> Result<PostId, AppError> {
        let featured_media = match &draft.media {
            Some(src) => match self.upload_media(src).await {
                Ok(id) => Some(id),
                Err(e) => {
                    tracing::warn!(url = %draft.source_url, media = %src, error = %e, "Featured image upload failed, posting without it");
                    None
                }
            },
            None => None,
        };

        let request = PostRequest {
            title: &draft.title,
            content: &draft.html,
            status: "draft",
            categories: [self.category_id],
            tags: &self.config.tags,
            featured_media,
        };
        let response = self
            .client
            .post(self.config.endpoint("posts"))
            .basic_auth(&self.config.user, Some(&self.config.app_password))
            .json(&request)
            .send()
            .await
            .map_err(|e| request_error(e, TIMEOUT))?;
        let created: Created = json_or_error(response).await?;

        tracing::info!(url = %draft.source_url, post_id = created.id, "Draft saved");
        Ok(created.id)
    }
}

/// Decode a success body, or turn the status into a `PublishError`.
async fn json_or_error<T: for<'de> Deserialize<'de>>(response: Response) -> Result<T, AppError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AppError::PublishError {
            message: body,
            status_code: status.as_u16(),
        });
    }
    response
        .json()
        .await
        .map_err(|e| AppError::HttpError(format!("Unexpected WordPress response: {e}")))
}

/// Exact (case-insensitive) name match first, otherwise the first result.
fn pick_category(categories: &[Category], name: &str) -> Option<u64> {
    categories
        .iter()
        .find(|c| c.name.eq_ignore_ascii_case(name))
        .or_else(|| categories.first())
        .map(|c| c.id)
}

fn media_filename(src: &str) -> String {
    Url::parse(src)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut s| s.next_back().map(str::to_string))
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "featured-image.jpg".to_string())
}
