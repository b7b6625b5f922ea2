use std::net::IpAddr;
use std::time::Duration;

use panduan_core::error::AppError;
use panduan_core::traits::Fetcher;
use reqwest::Client;
use url::{Host, Url};

/// User-Agent sent with every request and matched against robots.txt.
pub const USER_AGENT: &str = "Panduan/0.1 (tutorial translator)";

/// Plain HTTP fetcher for listing pages, articles and robots.txt.
///
/// Refuses URLs that point into private or reserved address space unless
/// [`allow_private_urls`](Self::allow_private_urls) is set.
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: Client,
    timeout: Duration,
    allow_private: bool,
}

impl ReqwestFetcher {
    pub fn new() -> Result<Self, AppError> {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;
        Ok(Self {
            client,
            timeout,
            allow_private: false,
        })
    }

    /// Permit loopback and private-network targets (local test servers).
    pub fn allow_private_urls(mut self) -> Self {
        self.allow_private = true;
        self
    }
}

impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        if !self.allow_private {
            ensure_public_url(url).await?;
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| request_error(e, self.timeout))?;

        let status = response.status();
        match status.as_u16() {
            429 => return Err(AppError::RateLimitExceeded),
            code if !status.is_success() => {
                return Err(AppError::HttpError(format!("HTTP {code} for {url}")));
            }
            _ => {}
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to read body of {url}: {e}")))?;
        tracing::debug!(%url, bytes = body.len(), "Fetched document");
        Ok(body)
    }
}

/// Map a reqwest transport error onto the shared taxonomy.
pub(crate) fn request_error(e: reqwest::Error, timeout: Duration) -> AppError {
    if e.is_timeout() {
        AppError::Timeout(timeout.as_secs())
    } else if e.is_connect() {
        AppError::NetworkError(format!("Connection failed: {e}"))
    } else {
        AppError::HttpError(e.to_string())
    }
}

/// Reject non-http(s) URLs and hosts that resolve to non-public addresses.
pub(crate) async fn ensure_public_url(url: &str) -> Result<(), AppError> {
    let parsed = Url::parse(url).map_err(|e| AppError::HttpError(format!("Invalid URL {url}: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(AppError::HttpError(format!(
            "Scheme '{}' not allowed for {url}",
            parsed.scheme()
        )));
    }

    let addresses: Vec<IpAddr> = match parsed.host() {
        Some(Host::Ipv4(ip)) => vec![IpAddr::V4(ip)],
        Some(Host::Ipv6(ip)) => vec![IpAddr::V6(ip)],
        Some(Host::Domain(domain)) => {
            let port = parsed.port_or_known_default().unwrap_or(80);
            tokio::net::lookup_host((domain, port))
                .await
                .map_err(|e| AppError::NetworkError(format!("DNS lookup failed for {domain}: {e}")))?
                .map(|addr| addr.ip())
                .collect()
        }
        None => return Err(AppError::HttpError(format!("No host in {url}"))),
    };

    if addresses.is_empty() {
        return Err(AppError::NetworkError(format!("No addresses for {url}")));
    }
    if let Some(ip) = addresses.into_iter().find(|ip| !is_public(*ip)) {
        return Err(AppError::HttpError(format!(
            "Blocked non-public address {ip} for {url}"
        )));
    }
    Ok(())
}

fn is_public(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, ..] = v4.octets();
            let shared = a == 100 && (b & 0xC0) == 64; // 100.64.0.0/10
            !(v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                || v4.is_documentation()
                || shared)
        }
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return is_public(IpAddr::V4(v4));
            }
            let first = v6.segments()[0];
            let link_local = (first & 0xFFC0) == 0xFE80;
            let unique_local = (first & 0xFE00) == 0xFC00;
            !(v6.is_loopback() || v6.is_unspecified() || link_local || unique_local)
        }
    }
}
