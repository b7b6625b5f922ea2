use std::path::PathBuf;

use panduan_core::AppError;

pub const DEFAULT_STORE_PATH: &str = "translated_articles.json";

/// Where the article history lives.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub path: PathBuf,
}

impl StoreConfig {
    /// Read configuration from environment variables.
    ///
    /// - `PANDUAN_STORE_PATH` (optional, defaults to `translated_articles.json`)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_value(std::env::var("PANDUAN_STORE_PATH").ok())
    }

    fn from_value(raw: Option<String>) -> Result<Self, AppError> {
        let path = match raw {
            None => PathBuf::from(DEFAULT_STORE_PATH),
            Some(raw) if raw.trim().is_empty() => {
                return Err(AppError::ConfigError(
                    "PANDUAN_STORE_PATH is set but empty".into(),
                ));
            }
            Some(raw) => PathBuf::from(raw.trim()),
        };
        Ok(Self { path })
    }
}
