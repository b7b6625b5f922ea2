use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use panduan_core::error::AppError;
use panduan_core::store::{StoreFile, StoredArticle};
use panduan_core::traits::ArticleStore;
use tempfile::NamedTempFile;

use crate::config::StoreConfig;

/// Article history kept in a single pretty-printed JSON file.
///
/// Saves go to a temporary file in the same directory which is synced and
/// then renamed over the target, so readers only ever see the previous or
/// the new record.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(config.path.clone())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored entries for `url`, newest first.
    pub fn history(&self, url: &str, limit: usize) -> Result<Vec<StoredArticle>, AppError> {
        let file = self.load()?;
        Ok(file.history(url, limit).into_iter().cloned().collect())
    }

    fn directory(&self) -> &Path {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }

    fn store_error(&self, action: &str, e: impl std::fmt::Display) -> AppError {
        AppError::StoreError(format!("Failed to {action} {}: {e}", self.path.display()))
    }
}

impl ArticleStore for JsonFileStore {
    fn load(&self) -> Result<StoreFile, AppError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No store yet, starting empty");
                return Ok(StoreFile::default());
            }
            Err(e) => return Err(self.store_error("read", e)),
        };
        if raw.trim().is_empty() {
            return Ok(StoreFile::default());
        }
        serde_json::from_str(&raw).map_err(|e| self.store_error("parse", e))
    }

    fn save(&self, file: &StoreFile) -> Result<(), AppError> {
        let dir = self.directory();
        fs::create_dir_all(dir).map_err(|e| self.store_error("create directory for", e))?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| self.store_error("stage", e))?;
        serde_json::to_writer_pretty(&mut tmp, file).map_err(|e| self.store_error("encode", e))?;
        tmp.write_all(b"\n")
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| self.store_error("write", e))?;
        tmp.persist(&self.path)
            .map_err(|e| self.store_error("replace", e.error))?;

        tracing::debug!(
            path = %self.path.display(),
            articles = file.articles.len(),
            "Store saved"
        );
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_file_name_saves_into_current_directory() {
        let store = JsonFileStore::new("translated_articles.json");
        assert_eq!(store.directory(), Path::new("."));
        assert_eq!(store.location(), "translated_articles.json");
    }

    #[test]
    fn whitespace_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "\n  \n").unwrap();

        let loaded = JsonFileStore::new(&path).load().unwrap();
        assert_eq!(loaded, StoreFile::default());
    }
}
