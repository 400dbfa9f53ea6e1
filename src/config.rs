//! Configuration module for the order book sync service

use serde::Deserialize;
use std::env;
use std::str::FromStr;

use crate::error::{Result, SyncError};
use crate::orderbook::MarketId;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// WebSocket endpoint of the order book feed
    pub ws_url: String,

    /// Market selected at startup
    pub market_id: Option<MarketId>,

    /// Reconnection settings
    pub reconnect_attempts: u32,
    pub reconnect_interval_ms: u64,

    /// Minimum interval between views published to readers
    pub publish_interval_ms: u64,

    /// Idle time before a keepalive ping
    pub recv_timeout_secs: u64,

    /// Unix socket of an optional MessagePack consumer
    pub ipc_socket_path: Option<String>,

    /// Bind address of the health/metrics/view server
    pub http_addr: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        Ok(Self {
            ws_url: env::var("WS_URL").unwrap_or(defaults.ws_url),
            market_id: match env::var("MARKET_ID") {
                Ok(raw) if raw.trim().is_empty() => None,
                Ok(raw) => Some(raw.parse().map_err(|e| {
                    SyncError::ConfigError(format!("MARKET_ID: {e}"))
                })?),
                Err(_) => defaults.market_id,
            },
            reconnect_attempts: parse_var("RECONNECT_ATTEMPTS", defaults.reconnect_attempts)?,
            reconnect_interval_ms: parse_var(
                "RECONNECT_INTERVAL_MS",
                defaults.reconnect_interval_ms,
            )?,
            publish_interval_ms: parse_var("PUBLISH_INTERVAL_MS", defaults.publish_interval_ms)?,
            recv_timeout_secs: parse_var("RECV_TIMEOUT_SECS", defaults.recv_timeout_secs)?,
            ipc_socket_path: env::var("IPC_SOCKET_PATH").ok().filter(|p| !p.is_empty()),
            http_addr: env::var("HTTP_ADDR").unwrap_or(defaults.http_addr),
        })
    }
}

/// Parse an optional variable, falling back to `default` when unset.
fn parse_var<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| SyncError::ConfigError(format!("{key}={raw:?}: {e}"))),
        Err(_) => Ok(default),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ws_url: "wss://ws.testnet.rise.trade/ws".to_string(),
            market_id: Some(MarketId(1)),
            reconnect_attempts: 10,
            reconnect_interval_ms: 3000,
            publish_interval_ms: 300,
            recv_timeout_secs: 45,
            ipc_socket_path: None,
            http_addr: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.reconnect_attempts, 10);
        assert_eq!(config.reconnect_interval_ms, 3000);
        assert_eq!(config.publish_interval_ms, 300);
        assert_eq!(config.market_id, Some(MarketId(1)));
    }

    #[test]
    fn test_parse_var() {
        // Process-wide environment; keys are unique to this test.
        env::set_var("ORDERBOOK_SYNC_TEST_GOOD", " 25 ");
        env::set_var("ORDERBOOK_SYNC_TEST_BAD", "soon");
        assert_eq!(parse_var("ORDERBOOK_SYNC_TEST_GOOD", 1u64).unwrap(), 25);
        assert_eq!(parse_var("ORDERBOOK_SYNC_TEST_UNSET", 7u64).unwrap(), 7);
        assert!(matches!(
            parse_var("ORDERBOOK_SYNC_TEST_BAD", 1u64),
            Err(SyncError::ConfigError(_))
        ));
    }
}
