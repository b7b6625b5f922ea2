//! Minimum spacing between requests that share a key.
//!
//! Document fetches are keyed by origin ([`ThrottledFetcher`]); the text
//! service is paced under a single key by [`crate::retry::ExternalCaller`].
//! Pacing is separate from retry backoff: a retried call waits for both.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use url::Url;
use uuid::Uuid;

use crate::error::AppError;
use crate::traits::Fetcher;

/// Spacing between two requests with the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleConfig {
    pub delay: Duration,
    /// Upper bound of a random extra delay, drawn per request.
    pub jitter: Duration,
}

impl ThrottleConfig {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            jitter: Duration::ZERO,
        }
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    fn spacing(&self) -> Duration {
        let max = self.jitter.as_millis() as u64;
        if max == 0 {
            return self.delay;
        }
        // v4 uuids are filled from the OS random source.
        let extra = (Uuid::new_v4().as_u128() as u64) % max;
        self.delay + Duration::from_millis(extra)
    }
}

impl Default for ThrottleConfig {
    /// 1 s apart, up to 500 ms jitter.
    fn default() -> Self {
        Self::new(Duration::from_secs(1)).with_jitter(Duration::from_millis(500))
    }
}

/// Hands out request slots per key. Clones share the same schedule.
///
/// Each call reserves the next free slot for its key before sleeping, so
/// two callers on the same key never get the same slot.
#[derive(Debug, Clone)]
pub struct Throttle {
    config: ThrottleConfig,
    next_slot: Arc<Mutex<HashMap<String, Instant>>>,
}

impl Throttle {
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            config,
            next_slot: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn disabled() -> Self {
        Self::new(ThrottleConfig::new(Duration::ZERO))
    }

    /// Sleep until `key` may be used again.
    pub async fn wait(&self, key: &str) {
        let wait = self.reserve(key, Instant::now());
        if !wait.is_zero() {
            tracing::debug!(%key, wait_ms = wait.as_millis() as u64, "Pacing request");
            tokio::time::sleep(wait).await;
        }
    }

    /// Claim the first slot at or after `now`; returns how long to wait for it.
    fn reserve(&self, key: &str, now: Instant) -> Duration {
        let mut slots = self.next_slot.lock().unwrap_or_else(|e| e.into_inner());
        let slot = slots.get(key).copied().filter(|s| *s > now).unwrap_or(now);
        slots.insert(key.to_string(), slot + self.config.spacing());
        slot - now
    }
}

/// Paces document fetches per origin (`scheme://host[:port]`).
#[derive(Clone)]
pub struct ThrottledFetcher<F> {
    inner: F,
    throttle: Throttle,
}

impl<F: Fetcher> ThrottledFetcher<F> {
    pub fn new(inner: F, config: ThrottleConfig) -> Self {
        Self {
            inner,
            throttle: Throttle::new(config),
        }
    }
}

fn origin_of(url: &str) -> Option<String> {
    let origin = Url::parse(url).ok()?.origin();
    origin.is_tuple().then(|| origin.ascii_serialization())
}

impl<F: Fetcher> Fetcher for ThrottledFetcher<F> {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        if let Some(origin) = origin_of(url) {
            self.throttle.wait(&origin).await;
        }
        self.inner.fetch(url).await
    }
}
