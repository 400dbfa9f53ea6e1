//! Immutable copies of the ledger handed to readers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BookSide, MarketId, OrderBookLedger, OrderBookMetrics};

/// Read-only view of the book plus connection flags.
///
/// Always an owned copy; readers never see the live ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookView {
    pub market_id: Option<MarketId>,
    pub bid: BookSide,
    pub ask: BookSide,
    pub is_connected: bool,
    pub has_snapshot: bool,
    pub published_at: DateTime<Utc>,
}

impl BookView {
    /// An empty view, used after resets and before the first snapshot
    pub fn empty(market_id: Option<MarketId>, is_connected: bool) -> Self {
        Self {
            market_id,
            bid: BookSide::new(),
            ask: BookSide::new(),
            is_connected,
            has_snapshot: false,
            published_at: Utc::now(),
        }
    }

    /// Copy the current contents of a ledger
    pub fn capture(ledger: &OrderBookLedger, is_connected: bool, has_snapshot: bool) -> Self {
        Self {
            market_id: Some(ledger.market_id()),
            bid: ledger.bids().clone(),
            ask: ledger.asks().clone(),
            is_connected,
            has_snapshot,
            published_at: Utc::now(),
        }
    }

    /// True when the view should render as loading/stale
    pub fn is_loading(&self) -> bool {
        !self.is_connected || !self.has_snapshot
    }

    /// Derived metrics over the top `depth` levels of each side
    pub fn metrics(&self, depth: usize) -> OrderBookMetrics {
        OrderBookMetrics::compute(&self.bid, &self.ask, depth)
    }
}

impl Default for BookView {
    fn default() -> Self {
        Self::empty(None, false)
    }
}
