//! Synchronization controller
//!
//! Owns the ledger of the selected market and reacts to four transitions:
//! market changed, stream opened, stream closed and checksum divergence.
//! Subscriptions are tracked explicitly as (market, generation); whenever the
//! desired subscription differs from the active one the old one is torn down
//! with an unsubscribe and the new one requested with a subscribe.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use super::{MessageSink, StreamEvent, Throttle};
use crate::orderbook::{BookView, MarketId, OrderBookLedger};
use crate::parser::{subscribe_request, unsubscribe_request};
use crate::router::{route, Decision};
use crate::telemetry::SyncTelemetry;

/// Process-local sync flags for the current subscription
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    pub last_verified_checksum: Option<u32>,
    pub pending_resubscribe: bool,
    pub has_snapshot: bool,
    pub is_connected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Subscription {
    market_id: MarketId,
    generation: u64,
}

/// Drives one market subscription and publishes throttled views of its book
pub struct SyncController<S: MessageSink> {
    sink: S,
    ledger: Option<OrderBookLedger>,
    state: SyncState,
    generation: u64,
    subscription: Option<Subscription>,
    throttle: Throttle,
    view_tx: watch::Sender<BookView>,
    telemetry: SyncTelemetry,
}

impl<S: MessageSink> SyncController<S> {
    pub fn new(sink: S, publish_interval: Duration, telemetry: SyncTelemetry) -> Self {
        let (view_tx, _) = watch::channel(BookView::default());
        Self {
            sink,
            ledger: None,
            state: SyncState::default(),
            generation: 0,
            subscription: None,
            throttle: Throttle::new(publish_interval),
            view_tx,
            telemetry,
        }
    }

    /// Receiver for published views
    pub fn subscribe_view(&self) -> watch::Receiver<BookView> {
        self.view_tx.subscribe()
    }

    pub fn selected_market(&self) -> Option<MarketId> {
        self.ledger.as_ref().map(OrderBookLedger::market_id)
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    pub fn ledger(&self) -> Option<&OrderBookLedger> {
        self.ledger.as_ref()
    }

    /// Number of checksum-triggered resubscriptions so far
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Time of the pending trailing publish, if any
    pub fn publish_deadline(&self) -> Option<Instant> {
        self.throttle.deadline()
    }

    /// The view layer selected a different market (or none).
    pub fn select_market(&mut self, market_id: Option<MarketId>) {
        if market_id == self.selected_market() {
            return;
        }
        info!(from = ?self.selected_market(), to = ?market_id, "Selected market changed");
        self.ledger = market_id.map(OrderBookLedger::new);
        self.reset();
        self.sync_subscription();
    }

    /// The stream reached the open state.
    pub fn on_open(&mut self) {
        info!(market_id = ?self.selected_market(), "Stream open");
        self.state.is_connected = true;
        self.publish_now();
        self.sync_subscription();
    }

    /// The stream closed. Its subscription died with it.
    pub fn on_close(&mut self) {
        info!(market_id = ?self.selected_market(), "Stream closed, discarding book");
        self.state.is_connected = false;
        self.subscription = None;
        self.ledger = self.selected_market().map(OrderBookLedger::new);
        self.reset();
    }

    /// Route one inbound frame. Returns `None` when no market is selected.
    pub fn on_message(&mut self, raw: &str) -> Option<Decision> {
        let ledger = self.ledger.as_mut()?;
        let decision = route(raw, ledger);
        self.telemetry.record_decision(decision.label());

        match &decision {
            Decision::Skip(reason) => {
                debug!(reason = ?reason, "Skipped message");
            }
            Decision::Resubscribe { .. } => {
                self.generation += 1;
                self.state.pending_resubscribe = true;
                info!(generation = self.generation, "Resubscribing after checksum divergence");
                self.sync_subscription();
            }
            Decision::Commit { is_snapshot, checksum } => {
                if *is_snapshot {
                    self.state.has_snapshot = true;
                    self.state.pending_resubscribe = false;
                    self.state.last_verified_checksum = None;
                }
                if checksum.is_some() {
                    self.state.last_verified_checksum = *checksum;
                }
                self.request_publish();
            }
        }

        Some(decision)
    }

    /// Fire the trailing publish if its deadline has passed.
    pub fn flush_due(&mut self) {
        if !self.throttle.fire_due(Instant::now()) {
            return;
        }
        if self.ledger.as_ref().is_some_and(OrderBookLedger::is_divergent) {
            debug!("Holding trailing publish while book is divergent");
            return;
        }
        self.publish_now();
    }

    /// Tear down: no publish fires afterwards and the active subscription is
    /// released.
    pub fn shutdown(&mut self) {
        self.throttle.cancel();
        if self.subscription.take().is_some() {
            self.send(unsubscribe_request(), "unsubscribe");
        }
    }

    /// Process stream events and market selections until the stream goes away
    /// or `stop` resolves. The final unsubscribe is queued on the sink before
    /// this returns.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<StreamEvent>,
        mut markets: watch::Receiver<Option<MarketId>>,
        mut stop: oneshot::Receiver<()>,
    ) {
        let initial = *markets.borrow_and_update();
        self.select_market(initial);
        let mut markets_open = true;

        loop {
            let deadline = self.throttle.deadline();
            tokio::select! {
                event = events.recv() => match event {
                    Some(StreamEvent::Opened) => self.on_open(),
                    Some(StreamEvent::Message(text)) => {
                        self.on_message(&text);
                    }
                    Some(StreamEvent::Closed) => self.on_close(),
                    None => break,
                },
                changed = markets.changed(), if markets_open => match changed {
                    Ok(()) => {
                        let market_id = *markets.borrow_and_update();
                        self.select_market(market_id);
                    }
                    Err(_) => markets_open = false,
                },
                _ = wait_until(deadline) => self.flush_due(),
                _ = &mut stop => {
                    info!("Stop requested");
                    break;
                }
            }
        }

        info!("Shutting down controller");
        self.shutdown();
    }

    /// Discard book state and publish an empty view immediately.
    fn reset(&mut self) {
        self.throttle.cancel();
        self.state.has_snapshot = false;
        self.state.pending_resubscribe = false;
        self.state.last_verified_checksum = None;
        self.telemetry.record_reset();
        self.publish_now();
    }

    fn sync_subscription(&mut self) {
        let desired = match (self.state.is_connected, self.selected_market()) {
            (true, Some(market_id)) => Some(Subscription {
                market_id,
                generation: self.generation,
            }),
            _ => None,
        };
        if desired == self.subscription {
            return;
        }

        if let Some(old) = self.subscription.take() {
            debug!(market_id = %old.market_id, generation = old.generation, "Unsubscribing");
            self.send(unsubscribe_request(), "unsubscribe");
        }
        if let Some(new) = desired {
            debug!(market_id = %new.market_id, generation = new.generation, "Subscribing");
            self.send(subscribe_request(new.market_id), "subscribe");
        }
        self.subscription = desired;
    }

    fn send(&self, text: String, method: &'static str) {
        match self.sink.send_text(text) {
            Ok(()) => self.telemetry.record_request(method),
            Err(e) => warn!(error = %e, method, "Failed to send request"),
        }
    }

    fn request_publish(&mut self) {
        if self.throttle.request(Instant::now()) {
            self.publish_now();
        }
    }

    fn publish_now(&mut self) {
        let view = match &self.ledger {
            Some(ledger) => {
                BookView::capture(ledger, self.state.is_connected, self.state.has_snapshot)
            }
            None => BookView::empty(None, self.state.is_connected),
        };
        self.view_tx.send_replace(view);
        self.telemetry.record_publish();
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
