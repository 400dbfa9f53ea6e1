//! Error types for the order book sync engine

use thiserror::Error;

/// Order book sync errors
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("WebSocket connection error: {0}")]
    WebSocketConnection(String),

    #[error("WebSocket message error: {0}")]
    WebSocketMessage(String),

    #[error("Failed to parse message: {0}")]
    ParseError(String),

    #[error("Invalid price level: {0}")]
    InvalidLevel(String),

    #[error("IPC error: {0}")]
    IpcError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Metrics error: {0}")]
    MetricsError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Connection timeout")]
    ConnectionTimeout,

    #[error("Outbound channel closed")]
    ChannelClosed,

    #[error("Max reconnection attempts exceeded ({0})")]
    MaxReconnectAttemptsExceeded(u32),
}

impl From<tokio_tungstenite::tungstenite::Error> for SyncError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        SyncError::WebSocketConnection(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::ParseError(err.to_string())
    }
}

impl From<rmp_serde::encode::Error> for SyncError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        SyncError::SerializationError(err.to_string())
    }
}

impl From<prometheus::Error> for SyncError {
    fn from(err: prometheus::Error) -> Self {
        SyncError::MetricsError(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::IpcError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
