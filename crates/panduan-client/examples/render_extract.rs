//! Render a page in headless Chromium and print what the extractor finds.
//!
//!   cargo run -p panduan-client --example render_extract --features browser -- <url>
use panduan_client::{BrowserFetcher, ScraperExtractor};
use panduan_core::traits::{DocumentExtractor, Fetcher};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "https://example.com".to_string());

    let fetcher = BrowserFetcher::launch().await?;
    let html = fetcher.fetch(&url).await?;
    println!("rendered {} bytes from {url}", html.len());

    let document = ScraperExtractor::new().extract(&html, &url)?;
    println!("title: {}", document.title);
    println!("blocks: {}", document.blocks.len());
    for block in document.blocks.iter().take(10) {
        println!("  {block:?}");
    }
    Ok(())
}
