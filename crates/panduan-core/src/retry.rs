//! Retry-with-backoff gateway to unreliable text services.
//!
//! Every external text call in the pipeline (translation, tutorial
//! decisions, image relevance) goes through [`ExternalCaller::call`].
//! Failures are classified per attempt: transient ones are retried with
//! backoff until the attempt budget runs out, permanent ones stop at once.
//! Neither case raises; the caller gets a [`CallError`] it can turn into a
//! field sentinel or a conservative keep/drop decision.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;

use crate::error::AppError;
use crate::models::{FailureKind, FieldFailure};
use crate::throttle::Throttle;
use crate::traits::TextService;

/// Delay schedule between retryable attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay after every failed attempt.
    Fixed(Duration),
    /// delay = base * 2^attempt
    Exponential { base: Duration },
}

impl Backoff {
    /// Delay after the failed attempt with 0-based index `attempt`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self {
            Backoff::Fixed(delay) => *delay,
            Backoff::Exponential { base } => base.saturating_mul(2u32.saturating_pow(attempt)),
        }
    }
}

/// Retry configuration, constructed once per caller.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub backoff: Backoff,
    /// Classifies a failure as transient (`true`) or permanent.
    pub retryable: fn(&AppError) -> bool,
}

impl Default for RetryPolicy {
    /// 3 attempts, exponential backoff from 2 seconds.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::Exponential {
                base: Duration::from_secs(2),
            },
            retryable: AppError::is_retryable,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_retryable(mut self, predicate: fn(&AppError) -> bool) -> Self {
        self.retryable = predicate;
        self
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.max_attempts == 0 {
            return Err(AppError::ConfigError(
                "retry policy needs at least 1 attempt".into(),
            ));
        }
        Ok(())
    }
}

/// Why a call through [`ExternalCaller`] produced no text.
#[derive(Error, Debug)]
pub enum CallError {
    /// Transient failures used up the whole attempt budget.
    #[error("service unavailable after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: AppError },

    /// The service refused the request; no retry was attempted.
    #[error("service rejected the request: {error}")]
    Permanent { attempts: u32, error: AppError },
}

impl CallError {
    pub fn attempts(&self) -> u32 {
        match self {
            CallError::Exhausted { attempts, .. } | CallError::Permanent { attempts, .. } => {
                *attempts
            }
        }
    }

    /// The sentinel value a transform stage attaches to the affected field.
    pub fn to_field_failure(&self) -> FieldFailure {
        let kind = match self {
            CallError::Exhausted { .. } => FailureKind::Unavailable,
            CallError::Permanent { .. } => FailureKind::Rejected,
        };
        FieldFailure::new(kind, self.to_string())
    }
}

/// Cumulative counters across all clones of one caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CallStats {
    pub calls: u64,
    pub attempts: u64,
    pub exhausted: u64,
    pub rejected: u64,
}

#[derive(Debug, Default)]
struct CallCounters {
    calls: AtomicU64,
    attempts: AtomicU64,
    exhausted: AtomicU64,
    rejected: AtomicU64,
}

/// The single retry/backoff-wrapped gateway to a [`TextService`].
///
/// Clones share the pacing throttle and the counters, so stages holding
/// clones of one caller respect the same inter-call interval.
#[derive(Clone)]
pub struct ExternalCaller<T> {
    name: Arc<str>,
    service: T,
    policy: RetryPolicy,
    throttle: Throttle,
    counters: Arc<CallCounters>,
}

impl<T: TextService> ExternalCaller<T> {
    pub fn new(name: &str, service: T, policy: RetryPolicy) -> Self {
        Self {
            name: Arc::from(name),
            service,
            policy,
            throttle: Throttle::disabled(),
            counters: Arc::new(CallCounters::default()),
        }
    }

    /// Pace consecutive calls to the service, independent of retry backoff.
    pub fn with_throttle(mut self, throttle: Throttle) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn stats(&self) -> CallStats {
        CallStats {
            calls: self.counters.calls.load(Ordering::Relaxed),
            attempts: self.counters.attempts.load(Ordering::Relaxed),
            exhausted: self.counters.exhausted.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
        }
    }

    /// Send `prompt`, retrying transient failures per the policy.
    ///
    /// `Ok("")` means the service answered with empty text.
    pub async fn call(&self, prompt: &str) -> Result<String, CallError> {
        let started = Instant::now();
        let max_attempts = self.policy.max_attempts.max(1);
        self.counters.calls.fetch_add(1, Ordering::Relaxed);

        let mut attempt: u32 = 0;
        let outcome = loop {
            self.throttle.wait(&self.name).await;
            self.counters.attempts.fetch_add(1, Ordering::Relaxed);
            let attempt_no = attempt + 1;

            match self.service.complete(prompt).await {
                Ok(text) => {
                    tracing::debug!(
                        service = %self.name,
                        attempt = attempt_no,
                        max_attempts,
                        "Call succeeded"
                    );
                    break Ok(text);
                }
                Err(error) if !(self.policy.retryable)(&error) => {
                    tracing::warn!(
                        service = %self.name,
                        attempt = attempt_no,
                        max_attempts,
                        error = %error,
                        "Call failed permanently"
                    );
                    self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                    break Err(CallError::Permanent {
                        attempts: attempt_no,
                        error,
                    });
                }
                Err(error) if attempt_no >= max_attempts => {
                    tracing::warn!(
                        service = %self.name,
                        attempt = attempt_no,
                        max_attempts,
                        error = %error,
                        "Call failed, retry budget exhausted"
                    );
                    self.counters.exhausted.fetch_add(1, Ordering::Relaxed);
                    break Err(CallError::Exhausted {
                        attempts: attempt_no,
                        last_error: error,
                    });
                }
                Err(error) => {
                    let delay = self.policy.backoff.delay_for_attempt(attempt);
                    tracing::warn!(
                        service = %self.name,
                        attempt = attempt_no,
                        max_attempts,
                        error = %error,
                        retry_in_ms = %delay.as_millis(),
                        "Call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        };

        tracing::info!(
            service = %self.name,
            elapsed_ms = %started.elapsed().as_millis(),
            ok = outcome.is_ok(),
            "External call completed"
        );
        outcome
    }
}
