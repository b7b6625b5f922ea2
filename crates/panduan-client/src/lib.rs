pub mod extractor;
pub mod fetcher;
pub mod links;
pub mod llm;
pub mod robots;
pub mod wordpress;

#[cfg(feature = "browser")]
pub mod browser_fetcher;

#[cfg(feature = "browser")]
pub use browser_fetcher::BrowserFetcher;
pub use extractor::ScraperExtractor;
pub use fetcher::{ReqwestFetcher, USER_AGENT};
pub use links::discover_links;
pub use llm::OpenAiTextService;
pub use robots::RobotsGuard;
pub use wordpress::{WordPressConfig, WordPressPublisher};
