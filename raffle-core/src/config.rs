use crate::error::{RaffleError, Result};
use crate::ledger::DEFAULT_TOTAL_PRIZES;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Api key shipped in the sample configuration; never a real backend.
pub const PLACEHOLDER_API_KEY: &str = "demo-api-key";

pub const DEFAULT_CACHE_KEY: &str = "raffleFallbackData";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RaffleConfig {
    pub total_prizes: u32,
    pub remote: Option<RemoteConfig>,
    pub poll_interval_ms: u64,
    pub request_timeout_ms: u64,
    pub reveal_delay_ms: u64,
    pub display_offset_minutes: i32,
    pub display_format: String,
    pub cache_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl RemoteConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: None,
        }
    }

    /// Missing url or the sample api key: the client must run local-only.
    pub fn is_placeholder(&self) -> bool {
        self.url.trim().is_empty() || self.api_key.as_deref() == Some(PLACEHOLDER_API_KEY)
    }
}

impl Default for RaffleConfig {
    fn default() -> Self {
        Self {
            total_prizes: DEFAULT_TOTAL_PRIZES,
            remote: None,
            poll_interval_ms: 2_000,
            request_timeout_ms: 5_000,
            reveal_delay_ms: 2_500,
            display_offset_minutes: 7 * 60, // UTC+07:00
            display_format: "%d/%m/%Y %H:%M:%S".to_string(),
            cache_key: DEFAULT_CACHE_KEY.to_string(),
        }
    }
}

impl RaffleConfig {
    /// Load `path` if it exists, then apply environment overrides.
    pub async fn load(path: &Path) -> Result<Self> {
        let mut config = if tokio::fs::try_exists(path).await? {
            let raw = tokio::fs::read_to_string(path).await?;
            serde_json::from_str(&raw)
                .map_err(|e| RaffleError::config(format!("{}: {}", path.display(), e)))?
        } else {
            Self::default()
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("RAFFLE_REMOTE_URL") {
            let remote = self.remote.get_or_insert_with(|| RemoteConfig::new(""));
            remote.url = url;
        }

        if let Ok(key) = std::env::var("RAFFLE_API_KEY") {
            let remote = self.remote.get_or_insert_with(|| RemoteConfig::new(""));
            remote.api_key = Some(key);
        }
    }

    pub fn with_remote(mut self, remote: RemoteConfig) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn reveal_delay(&self) -> Duration {
        Duration::from_millis(self.reveal_delay_ms)
    }

    /// Remote settings usable for sync, or `None` for local-only operation.
    pub fn usable_remote(&self) -> Option<&RemoteConfig> {
        self.remote.as_ref().filter(|r| !r.is_placeholder())
    }

    /// Human readable timestamp shown next to each winner.
    pub fn display_timestamp(&self, at: DateTime<Utc>) -> String {
        let offset = FixedOffset::east_opt(self.display_offset_minutes * 60)
            .unwrap_or_else(|| Utc.fix());
        at.with_timezone(&offset)
            .format(&self.display_format)
            .to_string()
    }

    pub fn validate(&self) -> Result<()> {
        if self.total_prizes == 0 {
            return Err(RaffleError::config("Total prizes must be greater than 0"));
        }

        if self.poll_interval_ms == 0 {
            return Err(RaffleError::config("Poll interval must be greater than 0"));
        }

        if self.request_timeout_ms == 0 {
            return Err(RaffleError::config("Request timeout must be greater than 0"));
        }

        if FixedOffset::east_opt(self.display_offset_minutes * 60).is_none() {
            return Err(RaffleError::config(format!(
                "Display offset out of range: {} minutes",
                self.display_offset_minutes
            )));
        }

        if StrftimeItems::new(&self.display_format).any(|item| matches!(item, Item::Error)) {
            return Err(RaffleError::config(format!(
                "Invalid display format: {}",
                self.display_format
            )));
        }

        if self.cache_key.is_empty() {
            return Err(RaffleError::config("Cache key cannot be empty"));
        }

        Ok(())
    }
}
