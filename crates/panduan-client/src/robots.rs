use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use panduan_core::traits::Fetcher;
use robotstxt::DefaultMatcher;
use scraper::{Html, Selector};
use url::Url;

/// Filters URLs through each origin's `robots.txt`.
///
/// The file is fetched once per origin through the wrapped [`Fetcher`],
/// which should be a plain HTTP one. A body a browser wrapped in
/// `<html><pre>` is unwrapped first. An origin whose `robots.txt` can't
/// be fetched allows everything.
#[derive(Clone)]
pub struct RobotsGuard<F> {
    fetcher: F,
    user_agent: String,
    cache: Arc<Mutex<HashMap<String, Option<String>>>>,
}

impl<F: Fetcher> RobotsGuard<F> {
    pub fn new(fetcher: F, user_agent: impl Into<String>) -> Self {
        Self {
            fetcher,
            user_agent: user_agent.into(),
            cache: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Whether `url` may be fetched. Unparseable URLs are refused.
    pub async fn allowed(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        let origin = parsed.origin().ascii_serialization();

        let body = match self.cached(&origin) {
            Some(body) => body,
            None => {
                let body = self.load(&origin).await;
                self.cache
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .insert(origin.clone(), body.clone());
                body
            }
        };

        match body {
            Some(body) => {
                let mut matcher = DefaultMatcher::default();
                matcher.one_agent_allowed_by_robots(&body, &self.user_agent, url)
            }
            None => true,
        }
    }

    /// Keep only the allowed URLs, preserving order.
    pub async fn filter(&self, urls: Vec<String>) -> Vec<String> {
        let mut allowed = Vec::with_capacity(urls.len());
        for url in urls {
            if self.allowed(&url).await {
                allowed.push(url);
            } else {
                tracing::info!(%url, agent = %self.user_agent, "Disallowed by robots.txt");
            }
        }
        allowed
    }

    fn cached(&self, origin: &str) -> Option<Option<String>> {
        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(origin)
            .cloned()
    }

    async fn load(&self, origin: &str) -> Option<String> {
        let robots_url = format!("{origin}/robots.txt");
        match self.fetcher.fetch(&robots_url).await {
            Ok(body) => Some(robots_text(body)),
            Err(e) => {
                tracing::debug!(url = %robots_url, error = %e, "robots.txt unavailable, allowing all");
                None
            }
        }
    }
}

/// Plain text of a `robots.txt` body, unwrapping a rendered `<pre>` page.
fn robots_text(body: String) -> String {
    if !body.trim_start().starts_with('<') {
        return body;
    }
    let Ok(pre) = Selector::parse("pre") else {
        return body;
    };
    let document = Html::parse_document(&body);
    match document.select(&pre).next() {
        Some(element) => {
            tracing::debug!("Unwrapped rendered robots.txt");
            element.text().collect()
        }
        None => body,
    }
}
