//! WebSocket client for the order book feed
//!
//! One value of this type is one live connection.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, error, info, warn};

use crate::error::{Result, SyncError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A connected WebSocket
pub struct WebSocketClient {
    write: SplitSink<WsStream, Message>,
    read: SplitStream<WsStream>,
}

impl WebSocketClient {
    /// Connect to the WebSocket endpoint
    pub async fn connect(url: &str) -> Result<Self> {
        info!(url = %url, "Connecting to order book feed");

        let (ws_stream, response) = connect_async(url)
            .await
            .map_err(|e| SyncError::WebSocketConnection(format!("Failed to connect: {}", e)))?;

        info!(status = ?response.status(), "WebSocket connected");
        let (write, read) = ws_stream.split();
        Ok(Self { write, read })
    }

    /// Receive the next message. `Ok(None)` for control frames.
    pub async fn recv(&mut self) -> Result<Option<String>> {
        match self.read.next().await {
            Some(Ok(Message::Text(text))) => {
                debug!(len = text.len(), "Received text message");
                Ok(Some(text))
            }
            Some(Ok(Message::Binary(data))) => {
                let text = String::from_utf8_lossy(&data).to_string();
                Ok(Some(text))
            }
            Some(Ok(Message::Ping(data))) => {
                debug!("Received ping, sending pong");
                if let Err(e) = self.write.send(Message::Pong(data)).await {
                    warn!(error = %e, "Failed to send pong");
                }
                Ok(None)
            }
            Some(Ok(Message::Pong(_))) => {
                debug!("Received pong");
                Ok(None)
            }
            Some(Ok(Message::Close(frame))) => {
                warn!(frame = ?frame, "Received close frame");
                Err(SyncError::WebSocketConnection("Connection closed".to_string()))
            }
            Some(Ok(Message::Frame(_))) => Ok(None),
            Some(Err(e)) => {
                error!(error = %e, "WebSocket error");
                Err(SyncError::WebSocketMessage(e.to_string()))
            }
            None => {
                warn!("WebSocket stream ended");
                Err(SyncError::WebSocketConnection("Stream ended".to_string()))
            }
        }
    }

    /// Send a text frame
    pub async fn send(&mut self, text: String) -> Result<()> {
        self.write
            .send(Message::Text(text))
            .await
            .map_err(|e| SyncError::WebSocketMessage(e.to_string()))
    }

    /// Send a ping to keep connection alive
    pub async fn ping(&mut self) -> Result<()> {
        self.write
            .send(Message::Ping(vec![]))
            .await
            .map_err(|e| SyncError::WebSocketMessage(e.to_string()))
    }

    /// Close the connection
    pub async fn close(mut self) {
        let _ = self.write.close().await;
    }
}
