use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use panduan_core::error::AppError;
use panduan_core::traits::Fetcher;

/// Places a Chrome/Chromium binary is commonly installed. The snap entry
/// points at the real binary; the `/snap/bin` wrapper drops headless flags.
const CHROME_CANDIDATES: &[&str] = &[
    "/snap/chromium/current/usr/lib/chromium-browser/chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/google-chrome",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
];

/// Fetcher that renders pages in headless Chromium before returning the DOM.
///
/// Tutorial sites often build their listing and article pages client-side,
/// so the plain HTTP body has no `<h1>` to extract. One browser process is
/// shared by all clones; each fetch opens and closes its own tab.
#[derive(Clone)]
pub struct BrowserFetcher {
    browser: Arc<Browser>,
    timeout: Duration,
    wait_for: String,
}

impl BrowserFetcher {
    /// Launch with a 30 s page timeout, waiting for `<body>`.
    pub async fn launch() -> Result<Self, AppError> {
        Self::launch_with(Duration::from_secs(30)).await
    }

    pub async fn launch_with(timeout: Duration) -> Result<Self, AppError> {
        let mut builder = BrowserConfig::builder().no_sandbox().disable_default_args();
        if let Some(bin) = chrome_binary() {
            tracing::info!(binary = %bin.display(), "Using Chrome binary");
            builder = builder.chrome_executable(bin);
        }
        let config = builder
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--no-first-run")
            .build()
            .map_err(|e| AppError::ConfigError(format!("Browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| AppError::ConfigError(format!("Failed to launch browser: {e}")))?;

        // The CDP connection only makes progress while its handler is polled.
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::warn!(error = %e, "Browser handler stopped");
                    break;
                }
            }
        });

        Ok(Self {
            browser: Arc::new(browser),
            timeout,
            wait_for: "body".to_string(),
        })
    }

    /// CSS selector that must be present before the DOM is read.
    pub fn wait_for(mut self, selector: impl Into<String>) -> Self {
        self.wait_for = selector.into();
        self
    }

    async fn render(&self, url: &str) -> Result<String, AppError> {
        let page = self
            .browser
            .new_page(url)
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to open {url}: {e}")))?;

        let rendered = async {
            page.find_element(self.wait_for.as_str()).await.map_err(|e| {
                AppError::HttpError(format!("'{}' never appeared on {url}: {e}", self.wait_for))
            })?;
            page.content()
                .await
                .map_err(|e| AppError::HttpError(format!("Failed to read DOM of {url}: {e}")))
        }
        .await;

        if let Err(e) = page.close().await {
            tracing::debug!(%url, error = %e, "Failed to close tab");
        }
        rendered
    }
}

impl Fetcher for BrowserFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        let html = tokio::time::timeout(self.timeout, self.render(url))
            .await
            .map_err(|_| AppError::Timeout(self.timeout.as_secs()))??;
        tracing::debug!(%url, bytes = html.len(), "Rendered document");
        Ok(html)
    }
}

/// `CHROME_BIN` first, then the usual install locations. `None` lets
/// chromiumoxide run its own lookup.
fn chrome_binary() -> Option<PathBuf> {
    std::env::var_os("CHROME_BIN")
        .map(PathBuf::from)
        .into_iter()
        .chain(CHROME_CANDIDATES.iter().map(PathBuf::from))
        .find(|p| p.exists())
}
