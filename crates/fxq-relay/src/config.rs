//! Application configuration.

use crate::error::{AppError, AppResult};
use fxq_core::Ticker;
use fxq_server::ServerConfig;
use fxq_ws::FeedConfig;
use serde::{Deserialize, Serialize};

/// Environment variable that overrides `feed.api_key`.
pub const API_KEY_ENV: &str = "FXQ_API_KEY";

/// Upstream feed configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSection {
    /// WebSocket URL of the quote source.
    #[serde(default = "default_feed_url")]
    pub url: String,
    /// Authorization credential. Usually supplied through `FXQ_API_KEY`.
    #[serde(default)]
    pub api_key: String,
    /// Quality-of-service threshold sent with each subscribe.
    #[serde(default = "default_threshold_level")]
    pub threshold_level: u8,
    /// Tickers subscribed at start-up and after every reconnect.
    #[serde(default = "default_tickers")]
    pub tickers: Vec<Ticker>,
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,
    #[serde(default = "default_reconnect_jitter_ms")]
    pub reconnect_jitter_ms: u64,
    /// Consecutive failed sessions before giving up (0 = never).
    #[serde(default)]
    pub max_reconnect_attempts: u32,
    /// Quotes buffered between the feed client and the pipeline.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_feed_url() -> String {
    "wss://api.tiingo.com/fx".to_string()
}

fn default_threshold_level() -> u8 {
    5
}

fn default_tickers() -> Vec<Ticker> {
    ["eurusd", "usdjpy", "btcusd", "audusd"]
        .into_iter()
        .filter_map(|name| Ticker::new(name).ok())
        .collect()
}

fn default_reconnect_base_delay_ms() -> u64 {
    5_000
}

fn default_reconnect_max_delay_ms() -> u64 {
    60_000
}

fn default_reconnect_jitter_ms() -> u64 {
    1_000
}

fn default_channel_capacity() -> usize {
    1024
}

impl Default for FeedSection {
    fn default() -> Self {
        Self {
            url: default_feed_url(),
            api_key: String::new(),
            threshold_level: default_threshold_level(),
            tickers: default_tickers(),
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
            reconnect_jitter_ms: default_reconnect_jitter_ms(),
            max_reconnect_attempts: 0,
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl From<&FeedSection> for FeedConfig {
    fn from(cfg: &FeedSection) -> Self {
        Self {
            url: cfg.url.clone(),
            api_key: cfg.api_key.clone(),
            threshold_level: cfg.threshold_level,
            tickers: cfg.tickers.clone(),
            reconnect_base_delay_ms: cfg.reconnect_base_delay_ms,
            reconnect_max_delay_ms: cfg.reconnect_max_delay_ms,
            reconnect_jitter_ms: cfg.reconnect_jitter_ms,
            max_reconnect_attempts: cfg.max_reconnect_attempts,
            ..Default::default()
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub feed: FeedSection,
    #[serde(default)]
    pub server: ServerConfig,
}

impl AppConfig {
    /// Load from a TOML file, apply `FXQ_API_KEY`, and validate.
    pub fn load(path: &str) -> AppResult<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_api_key_override(std::env::var(API_KEY_ENV).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config {path}: {e}")))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Replace the file credential with one from the environment, if set.
    pub fn apply_api_key_override(&mut self, api_key: Option<String>) {
        if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
            self.feed.api_key = key;
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.feed.url.trim().is_empty() {
            return Err(AppError::Config("feed.url must not be empty".to_string()));
        }
        if self.feed.api_key.trim().is_empty() {
            return Err(AppError::Config(format!(
                "feed.api_key is empty (set it in the config file or {API_KEY_ENV})"
            )));
        }
        if self.feed.channel_capacity == 0 {
            return Err(AppError::Config(
                "feed.channel_capacity must be positive".to_string(),
            ));
        }
        if self.feed.reconnect_base_delay_ms > self.feed.reconnect_max_delay_ms {
            return Err(AppError::Config(
                "feed.reconnect_base_delay_ms exceeds feed.reconnect_max_delay_ms".to_string(),
            ));
        }
        if self.server.client_buffer == 0 {
            return Err(AppError::Config(
                "server.client_buffer must be positive".to_string(),
            ));
        }
        if self.server.max_connections == 0 {
            return Err(AppError::Config(
                "server.max_connections must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn feed_config(&self) -> FeedConfig {
        FeedConfig::from(&self.feed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.feed.api_key = "secret".to_string();
        config
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.feed.url, "wss://api.tiingo.com/fx");
        assert_eq!(config.feed.threshold_level, 5);
        assert_eq!(config.feed.tickers.len(), 4);
        assert_eq!(config.feed.reconnect_base_delay_ms, 5000);
        assert_eq!(config.server.port, 5001);
        assert_eq!(config.server.max_connections, 1000);
    }

    #[test]
    fn test_parse_sections() {
        let config = AppConfig::from_toml(
            r#"
            [feed]
            url = "ws://localhost:9000"
            api_key = "abc"
            tickers = ["EURUSD", "gbpusd"]
            max_reconnect_attempts = 3

            [server]
            port = 6001
            client_buffer = 32
            "#,
        )
        .unwrap();

        assert_eq!(config.feed.tickers[0].as_str(), "eurusd");
        assert_eq!(config.feed.max_reconnect_attempts, 3);
        assert_eq!(config.server.port, 6001);
        assert_eq!(config.server.client_buffer, 32);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_ticker_rejected() {
        let result = AppConfig::from_toml(
            r#"
            [feed]
            tickers = ["eurusd", ""]
            "#,
        );
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_api_key_override() {
        let mut config = valid_config();
        config.apply_api_key_override(Some("from-env".to_string()));
        assert_eq!(config.feed.api_key, "from-env");

        config.apply_api_key_override(Some("  ".to_string()));
        assert_eq!(config.feed.api_key, "from-env");

        config.apply_api_key_override(None);
        assert_eq!(config.feed.api_key, "from-env");
    }

    #[test]
    fn test_validate() {
        assert!(valid_config().validate().is_ok());

        let missing_key = AppConfig::default();
        assert!(matches!(missing_key.validate(), Err(AppError::Config(_))));

        let mut zero_buffer = valid_config();
        zero_buffer.server.client_buffer = 0;
        assert!(zero_buffer.validate().is_err());

        let mut inverted_backoff = valid_config();
        inverted_backoff.feed.reconnect_base_delay_ms = 120_000;
        assert!(inverted_backoff.validate().is_err());
    }

    #[test]
    fn test_feed_config_conversion() {
        let config = valid_config();
        let feed = config.feed_config();
        assert_eq!(feed.api_key, "secret");
        assert_eq!(feed.tickers, config.feed.tickers);
        assert_eq!(feed.reconnect_jitter_ms, 1000);
    }
}
