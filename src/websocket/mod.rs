//! WebSocket module for the feed connection

mod client;
mod manager;

pub use client::WebSocketClient;
pub use manager::{
    ConnectionState, ReconnectPolicy, ReconnectTrigger, StreamHandle, WebSocketManager,
};
