//! Configuration Management
//!
//! Connection settings for zpactl. Resolution order is built-in defaults,
//! then `<config_dir>/zpactl/config.json`, then environment, then CLI flags.
//! Credentials are never read from the file, only from the environment.

use crate::error::{ZpaError, ZpaResult};
use crate::zpa::client::DEFAULT_PAGE_SIZE;
use crate::zpa::retry::{RetryPolicy, DEFAULT_MAX_RETRIES};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://config.private.zscaler.com";
pub const ENV_BASE_URL: &str = "ZPA_BASE_URL";

/// Connection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// API root, without a trailing slash
    pub base_url: String,
    /// Per-request timeout
    pub timeout_secs: u64,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry, doubled for each later one
    pub base_delay_ms: u64,
    /// Items requested per page when listing
    pub page_size: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 240,
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay_ms: 1000,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Settings {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("zpactl").join("config.json"))
    }

    /// Load settings from the default location, falling back to defaults
    /// when the file is missing or unreadable
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Ignoring unreadable config {:?}: {}", path, e);
                Self::default()
            },
        }
    }

    /// Load settings from an explicit file
    pub fn load_from(path: &Path) -> ZpaResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ZpaError::Config(format!("cannot read {}: {e}", path.display())))?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Apply environment overrides (`ZPA_BASE_URL`)
    #[must_use]
    pub fn with_env(self) -> Self {
        self.with_lookup(|key| std::env::var(key).ok())
    }

    #[must_use]
    pub fn with_lookup(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(ENV_BASE_URL).filter(|v| !v.trim().is_empty()) {
            self.base_url = url.trim().to_string();
        }
        self
    }

    /// Check the settings before any network call is made
    pub fn validate(&self) -> ZpaResult<()> {
        let url = url::Url::parse(&self.base_url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ZpaError::Config(format!(
                "base_url must be http(s), got {}",
                self.base_url
            )));
        }
        if self.page_size == 0 {
            return Err(ZpaError::Config("page_size must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.base_delay_ms))
    }
}
