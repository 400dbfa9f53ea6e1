//! WebSocket connection manager
//!
//! Presents the feed as a bidirectional message stream: lifecycle and inbound
//! frames go out as [`StreamEvent`]s in arrival order, outbound requests come
//! in through an unbounded queue. Reconnects use a bounded number of attempts
//! at a fixed interval; once exhausted, only a [`ReconnectTrigger`] starts a
//! fresh connection.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Notify};
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, error, info, warn};

use super::WebSocketClient;
use crate::config::Config;
use crate::error::{Result, SyncError};
use crate::sync::StreamEvent;

/// Capacity of the inbound event queue
const EVENT_QUEUE_CAPACITY: usize = 1024;

/// Observable connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

/// Bounded retry at a fixed interval
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl From<&Config> for ReconnectPolicy {
    fn from(config: &Config) -> Self {
        Self {
            max_attempts: config.reconnect_attempts,
            interval: Duration::from_millis(config.reconnect_interval_ms),
        }
    }
}

/// Forces a brand-new connection after reconnect attempts are exhausted
#[derive(Debug, Clone, Default)]
pub struct ReconnectTrigger(Arc<Notify>);

impl ReconnectTrigger {
    /// Wake a manager that gave up reconnecting. No effect otherwise.
    pub fn force_new_connection(&self) {
        self.0.notify_waiters();
    }
}

/// Consumer side of the stream
pub struct StreamHandle {
    pub sink: mpsc::UnboundedSender<String>,
    pub events: mpsc::Receiver<StreamEvent>,
    pub state: watch::Receiver<ConnectionState>,
    pub reconnect: ReconnectTrigger,
}

/// Manages WebSocket connections with bounded reconnection
pub struct WebSocketManager {
    url: String,
    policy: ReconnectPolicy,
    recv_timeout: Duration,
    events: mpsc::Sender<StreamEvent>,
    outbound: mpsc::UnboundedReceiver<String>,
    state: watch::Sender<ConnectionState>,
    reconnect: ReconnectTrigger,
}

impl WebSocketManager {
    /// Create a new WebSocket manager and the handle its consumer uses
    pub fn new(url: &str, policy: ReconnectPolicy, recv_timeout: Duration) -> (Self, StreamHandle) {
        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let (sink, outbound) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Closed);
        let reconnect = ReconnectTrigger::default();

        let manager = Self {
            url: url.to_string(),
            policy,
            recv_timeout,
            events: events_tx,
            outbound,
            state: state_tx,
            reconnect: reconnect.clone(),
        };
        let handle = StreamHandle {
            sink,
            events: events_rx,
            state: state_rx,
            reconnect,
        };
        (manager, handle)
    }

    /// Run until the consumer drops its handle
    pub async fn run(mut self) -> Result<()> {
        info!(
            url = %self.url,
            max_attempts = self.policy.max_attempts,
            "Starting WebSocket manager"
        );
        let mut attempts: u32 = 0;

        loop {
            self.state.send_replace(ConnectionState::Connecting);
            match WebSocketClient::connect(&self.url).await {
                Ok(mut client) => {
                    attempts = 0;
                    let connected_at = Instant::now();
                    self.discard_stale_outbound();
                    self.state.send_replace(ConnectionState::Open);

                    let outcome = if self.events.send(StreamEvent::Opened).await.is_err() {
                        Ok(())
                    } else {
                        self.process(&mut client).await
                    };
                    if outcome.is_ok() {
                        self.flush_outbound(&mut client).await;
                    }
                    client.close().await;
                    self.state.send_replace(ConnectionState::Closed);

                    match outcome {
                        Ok(()) => {
                            info!("Stream consumer gone, stopping WebSocket manager");
                            return Ok(());
                        }
                        Err(e) => {
                            warn!(
                                error = %e,
                                connected_secs = connected_at.elapsed().as_secs(),
                                "Connection lost"
                            );
                        }
                    }
                    if self.events.send(StreamEvent::Closed).await.is_err() {
                        return Ok(());
                    }
                }
                Err(e) => {
                    error!(error = %e, attempt = attempts, "WebSocket connect failed");
                    self.state.send_replace(ConnectionState::Closed);
                }
            }

            if self.events.is_closed() {
                return Ok(());
            }

            attempts += 1;
            if attempts > self.policy.max_attempts {
                warn!(
                    error = %SyncError::MaxReconnectAttemptsExceeded(self.policy.max_attempts),
                    "Waiting for an external trigger to reconnect"
                );
                let notify = self.reconnect.0.clone();
                tokio::select! {
                    _ = notify.notified() => {
                        info!("Forced new connection");
                        attempts = 0;
                    }
                    _ = self.events.closed() => return Ok(()),
                }
                continue;
            }

            warn!(
                attempt = attempts,
                delay_ms = self.policy.interval.as_millis() as u64,
                "Reconnecting..."
            );
            sleep(self.policy.interval).await;
        }
    }

    /// Pump frames in both directions. Returns `Ok` when the consumer went
    /// away and an error when the connection failed.
    ///
    /// Only inbound frames count as liveness. After `recv_timeout` of silence
    /// a ping goes out; another `recv_timeout` without any frame drops the
    /// connection.
    async fn process(&mut self, client: &mut WebSocketClient) -> Result<()> {
        let mut last_message = Instant::now();
        let mut idle_deadline = last_message + self.recv_timeout;
        let mut awaiting_pong = false;

        loop {
            tokio::select! {
                received = client.recv() => {
                    let received = received?;
                    last_message = Instant::now();
                    idle_deadline = last_message + self.recv_timeout;
                    awaiting_pong = false;
                    if let Some(text) = received {
                        if self.events.send(StreamEvent::Message(text)).await.is_err() {
                            return Ok(());
                        }
                    }
                },
                _ = sleep_until(idle_deadline) => {
                    if awaiting_pong {
                        warn!(
                            last_message_secs = last_message.elapsed().as_secs(),
                            "No reply to keepalive ping, reconnecting"
                        );
                        return Err(SyncError::ConnectionTimeout);
                    }
                    warn!(
                        last_message_secs = last_message.elapsed().as_secs(),
                        "No message received within timeout, sending keepalive"
                    );
                    if let Err(e) = client.ping().await {
                        warn!(error = %e, "Failed to send keepalive ping, reconnecting");
                        return Err(SyncError::ConnectionTimeout);
                    }
                    awaiting_pong = true;
                    idle_deadline = Instant::now() + self.recv_timeout;
                },
                outbound = self.outbound.recv() => match outbound {
                    Some(text) => client.send(text).await?,
                    None => return Ok(()),
                },
            }
        }
    }

    /// Deliver requests the consumer queued before it went away, such as a
    /// final unsubscribe.
    async fn flush_outbound(&mut self, client: &mut WebSocketClient) {
        while let Ok(text) = self.outbound.try_recv() {
            if let Err(e) = client.send(text).await {
                warn!(error = %e, "Failed to flush outbound request");
                return;
            }
            debug!("Flushed outbound request");
        }
    }

    /// Requests queued while disconnected belong to the old connection.
    fn discard_stale_outbound(&mut self) {
        let mut dropped = 0usize;
        while self.outbound.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            info!(dropped, "Discarded requests queued while disconnected");
        }
    }
}
