//! Publisher module for IPC communication
//!
//! Forwards published book views to an external consumer over a Unix socket.
//! Each frame is a 4-byte big-endian length followed by a MessagePack body.

use bytes::{BufMut, BytesMut};
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::error::{Result, SyncError};
use crate::orderbook::BookView;

/// Publisher for sending book views via Unix socket
pub struct Publisher {
    socket_path: String,
    stream: Mutex<Option<UnixStream>>,
}

impl Publisher {
    /// Create a new publisher
    pub async fn new(socket_path: &str) -> Result<Self> {
        let publisher = Self {
            socket_path: socket_path.to_string(),
            stream: Mutex::new(None),
        };

        // The consumer may not be up yet
        if let Err(e) = publisher.connect().await {
            warn!(error = %e, "Initial IPC connection failed, will retry on publish");
        }

        Ok(publisher)
    }

    /// Connect to the Unix socket
    async fn connect(&self) -> Result<()> {
        let path = Path::new(&self.socket_path);

        if !path.exists() {
            return Err(SyncError::IpcError(format!(
                "Socket path does not exist: {}",
                self.socket_path
            )));
        }

        let stream = UnixStream::connect(path).await.map_err(|e| {
            SyncError::IpcError(format!("Failed to connect to {}: {}", self.socket_path, e))
        })?;

        let mut guard = self.stream.lock().await;
        *guard = Some(stream);

        info!(path = %self.socket_path, "Connected to IPC socket");
        Ok(())
    }

    /// Publish one view. Delivery failures are logged, not returned.
    pub async fn publish(&self, view: &BookView) -> Result<()> {
        let message = encode_frame(view)?;

        let mut guard = self.stream.lock().await;

        if guard.is_none() {
            drop(guard);
            if let Err(e) = self.connect().await {
                debug!(error = %e, "Failed to reconnect to IPC socket");
                return Ok(());
            }
            guard = self.stream.lock().await;
        }

        if let Some(stream) = guard.as_mut() {
            match stream.write_all(&message).await {
                Ok(_) => {
                    debug!(
                        market_id = ?view.market_id,
                        bid_levels = view.bid.len(),
                        ask_levels = view.ask.len(),
                        "Published book view"
                    );
                }
                Err(e) => {
                    warn!(error = %e, "Failed to write to IPC socket");
                    *guard = None;
                }
            }
        }

        Ok(())
    }

    /// Publish every view that appears on `views` until the sender is dropped
    pub async fn forward(self, mut views: watch::Receiver<BookView>) {
        while views.changed().await.is_ok() {
            let view = views.borrow_and_update().clone();
            if let Err(e) = self.publish(&view).await {
                warn!(error = %e, "Failed to publish book view");
            }
        }
        debug!("View channel closed, publisher stopping");
    }
}

/// Length-prefixed MessagePack frame for one view
pub fn encode_frame(view: &BookView) -> Result<BytesMut> {
    let data = rmp_serde::to_vec_named(view)?;
    let len = u32::try_from(data.len()).map_err(|_| {
        SyncError::SerializationError(format!("frame too large: {} bytes", data.len()))
    })?;

    let mut message = BytesMut::with_capacity(4 + data.len());
    message.put_u32(len);
    message.put_slice(&data);
    Ok(message)
}
