use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "browser")]
use panduan_client::BrowserFetcher;
use panduan_client::llm::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use panduan_client::{
    OpenAiTextService, ReqwestFetcher, RobotsGuard, ScraperExtractor, USER_AGENT,
    WordPressConfig, WordPressPublisher, discover_links,
};
use panduan_core::error::AppError;
use panduan_core::throttle::{ThrottleConfig, ThrottledFetcher};
use panduan_core::traits::{DocumentExtractor, Fetcher};
use panduan_core::{
    MergePolicy, Pipeline, PipelineConfig, RetryPolicy, RunAborted, RunReport, StoredArticle,
    TracingReporter,
};
use panduan_store::{JsonFileStore, StoreConfig};

#[derive(Parser)]
#[command(
    name = "panduan",
    version,
    about = "Translate tutorial articles and publish them as drafts"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape, translate, store and optionally publish tutorial articles
    Run(RunArgs),

    /// Fetch one page and print the extracted title and blocks as JSON
    Extract {
        /// Page to extract
        #[arg(short, long)]
        url: String,

        /// Render the page in headless Chromium first
        #[arg(long, default_value_t = false)]
        browser: bool,
    },

    /// Show stored translations for a URL
    History {
        /// Article URL
        #[arg(short, long)]
        url: String,

        /// Number of entries to show
        #[arg(short, long, default_value_t = 10)]
        limit: usize,

        /// Write CSV to stdout instead of a listing
        #[arg(long, default_value_t = false)]
        csv: bool,

        /// Store file (default: PANDUAN_STORE_PATH or translated_articles.json)
        #[arg(long)]
        store: Option<PathBuf>,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Article URL to process (repeatable). Skips listing discovery.
    #[arg(short, long)]
    url: Vec<String>,

    /// Listing page whose links are processed
    #[arg(long, env = "PANDUAN_LISTING_URL")]
    listing_url: Option<String>,

    /// Only links whose href starts with this prefix are followed
    #[arg(long, env = "PANDUAN_LINK_PREFIX", default_value = "/learn/")]
    link_prefix: String,

    /// Skip links containing this text (repeatable)
    #[arg(long, default_value = "trading-guide")]
    exclude: Vec<String>,

    /// Process at most this many articles
    #[arg(long)]
    max_articles: Option<usize>,

    /// Do not consult robots.txt
    #[arg(long, default_value_t = false)]
    ignore_robots: bool,

    /// Render pages in headless Chromium (requires the `browser` feature)
    #[arg(long, default_value_t = false)]
    browser: bool,

    /// Minimum delay between fetches to the same site, in milliseconds
    #[arg(long, default_value_t = 1000)]
    fetch_delay_ms: u64,

    /// API key for the text service
    #[arg(short, long, env = "PANDUAN_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Model used for translation and decisions
    #[arg(short, long, env = "PANDUAN_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// OpenAI-compatible API base URL
    #[arg(short, long, env = "PANDUAN_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Target language of the translation
    #[arg(long)]
    language: Option<String>,

    /// Drop articles whose rendered content is shorter than this
    #[arg(long, default_value_t = 200)]
    min_content_len: usize,

    /// Attempts per text-service call, including the first
    #[arg(long, default_value_t = 3)]
    max_attempts: u32,

    /// Minimum pause between text-service calls, in milliseconds
    #[arg(long, default_value_t = 1000)]
    call_interval_ms: u64,

    /// Ask the model whether each article is a structured tutorial
    #[arg(long, default_value_t = false)]
    require_tutorial: bool,

    /// Ask the model whether each image belongs to its article
    #[arg(long, default_value_t = false)]
    check_image_relevance: bool,

    /// Replace earlier stored entries for the same URL instead of appending
    #[arg(long, default_value_t = false)]
    latest_wins: bool,

    /// Store file (default: PANDUAN_STORE_PATH or translated_articles.json)
    #[arg(long)]
    store: Option<PathBuf>,

    /// Create a WordPress draft for every stored article
    #[arg(long, default_value_t = false)]
    publish: bool,

    #[command(flatten)]
    wordpress: WordPressArgs,
}

#[derive(Args)]
struct WordPressArgs {
    /// WordPress site URL
    #[arg(id = "wp_url", long = "wp-url", env = "WORDPRESS_URL")]
    url: Option<String>,

    #[arg(long = "wp-user", env = "WORDPRESS_USER")]
    user: Option<String>,

    /// Application password
    #[arg(long = "wp-app-pass", env = "WORDPRESS_APP_PASS", hide_env_values = true)]
    app_password: Option<String>,

    /// Category name for new drafts
    #[arg(long = "wp-category", env = "WORDPRESS_CATEGORY")]
    category: Option<String>,

    /// Comma-separated tag ids
    #[arg(long = "wp-tags", env = "WORDPRESS_TAGS")]
    tags: Option<String>,
}

impl WordPressArgs {
    fn config(&self) -> Result<WordPressConfig, AppError> {
        WordPressConfig::from_lookup(|key| match key {
            "WORDPRESS_URL" => self.url.clone(),
            "WORDPRESS_USER" => self.user.clone(),
            "WORDPRESS_APP_PASS" => self.app_password.clone(),
            "WORDPRESS_CATEGORY" => self.category.clone(),
            "WORDPRESS_TAGS" => self.tags.clone(),
            _ => None,
        })
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("panduan=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => cmd_run(args).await,
        Commands::Extract { url, browser } => {
            cmd_extract(&url, browser).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::History {
            url,
            limit,
            csv,
            store,
        } => {
            cmd_history(&url, limit, csv, open_store(store)?)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Plain HTTP or headless browser, chosen at runtime.
#[derive(Clone)]
enum CliFetcher {
    Http(ReqwestFetcher),
    #[cfg(feature = "browser")]
    Browser(BrowserFetcher),
}

impl CliFetcher {
    async fn build(browser: bool) -> Result<Self> {
        if browser {
            #[cfg(feature = "browser")]
            return Ok(Self::Browser(
                BrowserFetcher::launch()
                    .await
                    .context("Failed to start headless browser")?,
            ));
            #[cfg(not(feature = "browser"))]
            anyhow::bail!("--browser requires panduan to be built with the `browser` feature");
        }
        Ok(Self::Http(
            ReqwestFetcher::new().context("Failed to create HTTP client")?,
        ))
    }
}

impl Fetcher for CliFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        match self {
            CliFetcher::Http(f) => f.fetch(url).await,
            #[cfg(feature = "browser")]
            CliFetcher::Browser(f) => f.fetch(url).await,
        }
    }
}

async fn cmd_run(args: RunArgs) -> Result<ExitCode> {
    // Configuration problems surface before anything is fetched.
    let config = pipeline_config(&args);
    config.validate()?;
    let wordpress = if args.publish {
        let wp_config = args
            .wordpress
            .config()
            .context("--publish needs WordPress configuration")?;
        Some(WordPressPublisher::connect(wp_config).await?)
    } else {
        None
    };
    let service = OpenAiTextService::with_base_url(&args.api_key, &args.model, &args.base_url)?;
    let store = open_store(args.store.clone())?;

    let fetcher = ThrottledFetcher::new(
        CliFetcher::build(args.browser).await?,
        ThrottleConfig::new(Duration::from_millis(args.fetch_delay_ms))
            .with_jitter(Duration::from_millis(args.fetch_delay_ms / 2)),
    );

    // robots.txt always goes over plain HTTP; a browser would wrap it in markup.
    let robots = if args.ignore_robots {
        None
    } else {
        Some(RobotsGuard::new(
            ReqwestFetcher::new().context("Failed to create HTTP client")?,
            USER_AGENT,
        ))
    };
    let urls = collect_urls(&args, &fetcher, robots.as_ref()).await?;
    if urls.is_empty() {
        tracing::warn!("No article URLs to process");
    }
    tracing::info!(
        articles = urls.len(),
        model = %service.model(),
        store = %store.path().display(),
        "Starting run"
    );

    let pipeline = Pipeline::new(fetcher, ScraperExtractor::new(), service, store, &config)?;

    let outcome = match wordpress {
        Some(publisher) => {
            pipeline
                .with_publisher(publisher)
                .run(&urls, &TracingReporter)
                .await
        }
        None => pipeline.run(&urls, &TracingReporter).await,
    };
    finish(outcome)
}

fn pipeline_config(args: &RunArgs) -> PipelineConfig {
    let policy = if args.latest_wins {
        MergePolicy::LatestWins
    } else {
        MergePolicy::AppendOnly
    };
    let mut config = PipelineConfig::default()
        .with_min_content_len(args.min_content_len)
        .with_require_tutorial(args.require_tutorial)
        .with_image_relevance(args.check_image_relevance)
        .with_merge_policy(policy)
        .with_retry(RetryPolicy::default().with_max_attempts(args.max_attempts))
        .with_call_interval(Duration::from_millis(args.call_interval_ms));
    if let Some(language) = &args.language {
        config = config.with_target_language(language.clone());
    }
    config
}

/// Explicit `--url`s, or the links found on the listing page; then robots.txt.
///
/// The listing page itself must be allowed by `robots` before it is fetched.
async fn collect_urls<F: Fetcher, R: Fetcher>(
    args: &RunArgs,
    fetcher: &F,
    robots: Option<&RobotsGuard<R>>,
) -> Result<Vec<String>> {
    let mut urls = if args.url.is_empty() {
        let listing = args
            .listing_url
            .as_deref()
            .context("Pass --url or set PANDUAN_LISTING_URL")?;
        if let Some(guard) = robots {
            if !guard.allowed(listing).await {
                anyhow::bail!("Listing page {listing} is disallowed by robots.txt");
            }
        }
        tracing::info!(url = %listing, "Fetching listing page");
        let html = fetcher.fetch(listing).await?;
        let links = discover_links(&html, listing, &args.link_prefix, &args.exclude)?;
        tracing::info!(found = links.len(), prefix = %args.link_prefix, "Discovered article links");
        links
    } else {
        args.url.clone()
    };

    if let Some(guard) = robots {
        urls = guard.filter(urls).await;
    }
    if let Some(max) = args.max_articles {
        urls.truncate(max);
    }
    Ok(urls)
}

fn finish(outcome: Result<RunReport, RunAborted>) -> Result<ExitCode> {
    match outcome {
        Ok(report) => {
            eprintln!("{}", report.summary());
            Ok(ExitCode::SUCCESS)
        }
        Err(aborted) => {
            tracing::error!(
                error = %aborted.source,
                unsaved = aborted.unsaved.len(),
                "Run aborted, writing unsaved articles to stdout"
            );
            println!("{}", serde_json::to_string_pretty(&aborted.unsaved)?);
            eprintln!("{}", aborted.report.summary());
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn cmd_extract(url: &str, browser: bool) -> Result<()> {
    let fetcher = CliFetcher::build(browser).await?;
    tracing::info!("Fetching {}", url);
    let html = fetcher.fetch(url).await?;
    tracing::info!("Fetched {} bytes of HTML", html.len());

    let document = ScraperExtractor::new().extract(&html, url)?;
    tracing::info!(blocks = document.blocks.len(), "Extraction complete");

    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(())
}

fn open_store(path: Option<PathBuf>) -> Result<JsonFileStore> {
    Ok(match path {
        Some(path) => JsonFileStore::new(path),
        None => JsonFileStore::from_config(&StoreConfig::from_env()?),
    })
}

fn cmd_history(url: &str, limit: usize, csv: bool, store: JsonFileStore) -> Result<()> {
    let history = store
        .history(url, limit)
        .with_context(|| format!("Failed to read {}", store.path().display()))?;

    if csv {
        return write_history_csv(&history);
    }

    if history.is_empty() {
        println!("No stored translations for {url}");
        return Ok(());
    }

    println!("Translation history for {url}:\n");
    for (entry, status) in history.iter().zip(change_markers(&history)) {
        println!(
            "  [{}] {} — run {} (hash: {}..., title: {})",
            status,
            entry.saved_at.format("%Y-%m-%d %H:%M:%S UTC"),
            entry.run_id,
            entry.content_hash.get(..8).unwrap_or(&entry.content_hash),
            entry.translated_title.as_deref().unwrap_or(&entry.title),
        );
    }
    println!("\nTotal: {} entries", history.len());
    Ok(())
}

fn write_history_csv(history: &[StoredArticle]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(std::io::stdout());
    writer.write_record([
        "saved_at",
        "status",
        "run_id",
        "content_hash",
        "title",
        "translated_title",
    ])?;
    for (entry, status) in history.iter().zip(change_markers(history)) {
        writer.write_record([
            entry.saved_at.to_rfc3339().as_str(),
            status,
            entry.run_id.to_string().as_str(),
            entry.content_hash.as_str(),
            entry.title.as_str(),
            entry.translated_title.as_deref().unwrap_or(""),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Newest-first entries compared with the next older one. The oldest entry
/// is always "CHANGED".
fn change_markers(history: &[StoredArticle]) -> Vec<&'static str> {
    (0..history.len())
        .map(|i| match history.get(i + 1) {
            Some(older) if older.content_hash == history[i].content_hash => "unchanged",
            _ => "CHANGED",
        })
        .collect()
}
