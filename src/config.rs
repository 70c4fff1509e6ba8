use crate::error::{Result, UploadError};
use crate::upload::RetryPolicy;
use derivative::Derivative;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CHUNK_SIZE: u64 = 8_000_000;
/// 128 GiB, the largest asset the import endpoint accepts.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 131_072 * 1024 * 1024;

/// Settings for one import target. Every field can come from a TOML file;
/// missing fields fall back to the values the web panel uses.
#[derive(Derivative, Deserialize, Clone)]
#[derivative(Debug, Default)]
#[serde(default)]
pub struct ImportConfig {
    pub server: String,
    pub project_id: u64,
    #[derivative(Default(value = "DEFAULT_CHUNK_SIZE"))]
    pub chunk_size: u64,
    #[derivative(Default(value = "10"))]
    pub chunk_retry_limit: u32,
    #[derivative(Default(value = "10"))]
    pub commit_retry_limit: u32,
    #[derivative(Default(value = "2000"))]
    pub retry_base_delay_ms: u64,
    #[derivative(Default(value = "DEFAULT_MAX_FILE_SIZE"))]
    pub max_file_size: u64,
    /// Extra request headers (session cookie, CSRF token).
    #[derivative(Debug = "ignore")]
    pub headers: BTreeMap<String, String>,
}

impl ImportConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "reading import config");
        let content = fs::read_to_string(path).map_err(|e| UploadError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| UploadError::Config(e.to_string()))
    }

    /// Enough to talk to the server at all.
    pub fn validate_connection(&self) -> Result<()> {
        if self.server.trim().is_empty() {
            return Err(UploadError::Config("server URL is required".into()));
        }
        Ok(())
    }

    /// Enough to run an import.
    pub fn validate(&self) -> Result<()> {
        self.validate_connection()?;
        if self.project_id == 0 {
            return Err(UploadError::Config("project id is required".into()));
        }
        if self.chunk_size == 0 {
            return Err(UploadError::Config("chunk_size must be positive".into()));
        }
        Ok(())
    }

    pub fn base_url(&self) -> &str {
        self.server.trim_end_matches('/')
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    /// A chunk gives up on the `chunk_retry_limit`-th failure.
    pub fn chunk_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_base_delay(), self.chunk_retry_limit)
    }

    /// Commit is retried `commit_retry_limit` times after the first attempt.
    pub fn commit_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_base_delay(),
            self.commit_retry_limit.saturating_add(1),
        )
    }
}
