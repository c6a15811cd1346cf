//! Application configuration loaded from environment variables.

use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::error::MirrorError;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Endpoints ===
    /// Streaming (WebSocket) endpoint.
    #[serde(default = "default_ws_url")]
    pub mirror_ws_url: String,

    /// Base URL of the seed/bootstrap HTTP API.
    #[serde(default = "default_http_url")]
    pub mirror_http_url: String,

    /// Market to mirror (e.g., "SOL_USD").
    #[serde(default = "default_market")]
    pub mirror_market: String,

    // === Connection Lifecycle ===
    /// Fixed delay before rebuilding a closed transport.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Interval of the safety-net SUBSCRIBE re-send.
    #[serde(default = "default_resubscribe_interval_ms")]
    pub resubscribe_interval_ms: u64,

    /// Timeout for seed HTTP requests.
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,

    /// Maximum depth diffs held while waiting for the seed snapshot.
    #[serde(default = "default_seed_buffer_limit")]
    pub seed_buffer_limit: usize,

    // === Observability ===
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub rust_log: String,

    /// Enable verbose logging.
    #[serde(default)]
    pub verbose: bool,
}

fn default_ws_url() -> String {
    "ws://localhost:3001/v1/ws".to_string()
}

fn default_http_url() -> String {
    "http://localhost:8080/v1".to_string()
}

fn default_market() -> String {
    "SOL_USD".to_string()
}

fn default_reconnect_delay_ms() -> u64 {
    100
}

fn default_resubscribe_interval_ms() -> u64 {
    5_000
}

fn default_http_timeout_ms() -> u64 {
    5_000
}

fn default_seed_buffer_limit() -> usize {
    1024
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mirror_ws_url: default_ws_url(),
            mirror_http_url: default_http_url(),
            mirror_market: default_market(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            resubscribe_interval_ms: default_resubscribe_interval_ms(),
            http_timeout_ms: default_http_timeout_ms(),
            seed_buffer_limit: default_seed_buffer_limit(),
            rust_log: default_log_level(),
            verbose: false,
        }
    }
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, MirrorError> {
        dotenvy::dotenv().ok();
        Ok(envy::from_env()?)
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), MirrorError> {
        let ws = Url::parse(&self.mirror_ws_url)
            .map_err(|e| MirrorError::InvalidConfig(format!("MIRROR_WS_URL: {e}")))?;
        if !matches!(ws.scheme(), "ws" | "wss") {
            return Err(MirrorError::InvalidConfig(
                "MIRROR_WS_URL must use ws:// or wss://".to_string(),
            ));
        }

        Url::parse(&self.mirror_http_url)
            .map_err(|e| MirrorError::InvalidConfig(format!("MIRROR_HTTP_URL: {e}")))?;

        if self.mirror_market.trim().is_empty() {
            return Err(MirrorError::InvalidConfig(
                "MIRROR_MARKET is required".to_string(),
            ));
        }

        if self.reconnect_delay_ms == 0 {
            return Err(MirrorError::InvalidConfig(
                "RECONNECT_DELAY_MS must be greater than 0".to_string(),
            ));
        }

        if self.resubscribe_interval_ms == 0 {
            return Err(MirrorError::InvalidConfig(
                "RESUBSCRIBE_INTERVAL_MS must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Fixed reconnect delay.
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Safety-net re-subscribe interval.
    pub fn resubscribe_interval(&self) -> Duration {
        Duration::from_millis(self.resubscribe_interval_ms)
    }

    /// Seed HTTP timeout.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values_are_sensible() {
        let config = Config::default();
        assert_eq!(config.reconnect_delay(), Duration::from_millis(100));
        assert_eq!(config.resubscribe_interval(), Duration::from_secs(5));
        assert_eq!(config.mirror_market, "SOL_USD");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_http_scheme_for_stream() {
        let config = Config {
            mirror_ws_url: "http://localhost:3001".to_string(),
            ..Config::default()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_reconnect_delay() {
        let config = Config {
            reconnect_delay_ms: 0,
            ..Config::default()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_market() {
        let config = Config {
            mirror_market: "  ".to_string(),
            ..Config::default()
        };

        assert!(config.validate().is_err());
    }
}
