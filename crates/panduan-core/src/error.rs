use thiserror::Error;

/// Application-wide error types for Panduan.
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request failed (fetching a page, talking to the CMS).
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Text service (translation / decision) call failed.
    #[error("LLM error (HTTP {status_code}): {message}")]
    LlmError {
        message: String,
        status_code: u16,
        retryable: bool,
    },

    /// A document could not be turned into a usable title and body.
    #[error("Extraction error: {0}")]
    ExtractionError(String),

    /// Publishing collaborator rejected a post.
    #[error("Publish error (HTTP {status_code}): {message}")]
    PublishError { message: String, status_code: u16 },

    /// The article store could not be read or written.
    #[error("Store error: {0}")]
    StoreError(String),

    /// Required configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// The remote side answered 429.
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Connection could not be established or was dropped.
    #[error("Network error: {0}")]
    NetworkError(String),
}

impl AppError {
    /// Returns true if this error is transient and worth retrying.
    ///
    /// Rate limits (429) and server failures (5xx) are transient; client
    /// failures (bad request, bad credentials) are permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::NetworkError(_) | AppError::Timeout(_) | AppError::RateLimitExceeded => true,
            AppError::LlmError { retryable, .. } => *retryable,
            AppError::PublishError { status_code, .. } => {
                *status_code == 429 || *status_code >= 500
            }
            AppError::HttpError(msg) => {
                msg.contains("timeout") || msg.contains("connect") || msg.contains("reset")
            }
            _ => false,
        }
    }

    /// Returns true if this error must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::ConfigError(_) | AppError::StoreError(_))
    }

    /// Builds an [`AppError::LlmError`] from an HTTP status, classifying it.
    pub fn from_service_status(status_code: u16, message: impl Into<String>) -> Self {
        if status_code == 429 {
            return AppError::RateLimitExceeded;
        }
        AppError::LlmError {
            message: message.into(),
            status_code,
            retryable: status_code >= 500,
        }
    }
}
