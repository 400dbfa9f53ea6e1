//! Two-sided order book ledger for a single market
//!
//! A ledger is created empty, replaced wholesale by every snapshot and patched
//! in place by updates. It never repairs itself: once an update fails checksum
//! verification the ledger stays `Divergent` until a fresh snapshot replaces it.

use serde::{Deserialize, Serialize};

use super::{BookSide, Level, MarketId};
use crate::checksum::order_book_checksum;

/// Synchronization state of a ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerState {
    /// No snapshot applied yet
    Uninitialized,
    /// Built from a snapshot, every verified update matched the feed
    Synced,
    /// An update failed checksum verification; waiting for a snapshot
    Divergent,
}

/// Result of applying an update to the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The update carried no checksum
    Unverified,
    /// The post-update checksum matched the feed
    Verified(u32),
    /// The post-update checksum disagreed with the feed
    Diverged { expected: u32, computed: u32 },
}

/// Order book for one market
#[derive(Debug, Clone)]
pub struct OrderBookLedger {
    market_id: MarketId,
    bids: BookSide,
    asks: BookSide,
    state: LedgerState,
    last_verified_checksum: Option<u32>,
}

impl OrderBookLedger {
    /// Create an empty, uninitialized ledger
    pub fn new(market_id: MarketId) -> Self {
        Self {
            market_id,
            bids: BookSide::new(),
            asks: BookSide::new(),
            state: LedgerState::Uninitialized,
            last_verified_checksum: None,
        }
    }

    /// Build a brand-new ledger from snapshot levels.
    ///
    /// Nothing from any previous ledger survives; prices missing from the
    /// snapshot are implicitly zero.
    pub fn from_snapshot(market_id: MarketId, bids: &[Level], asks: &[Level]) -> Self {
        let mut ledger = Self::new(market_id);
        ledger.bids.patch(bids);
        ledger.asks.patch(asks);
        ledger.state = LedgerState::Synced;
        ledger
    }

    /// Patch both sides in place, then verify against `checksum` if present.
    ///
    /// The patch is not rolled back on a mismatch.
    pub fn apply_update(
        &mut self,
        bids: &[Level],
        asks: &[Level],
        checksum: Option<u32>,
    ) -> UpdateOutcome {
        self.asks.patch(asks);
        self.bids.patch(bids);

        let Some(expected) = checksum else {
            return UpdateOutcome::Unverified;
        };

        let computed = self.checksum();
        if computed == expected {
            self.last_verified_checksum = Some(computed);
            UpdateOutcome::Verified(computed)
        } else {
            self.state = LedgerState::Divergent;
            UpdateOutcome::Diverged { expected, computed }
        }
    }

    /// Canonical checksum of the current contents
    pub fn checksum(&self) -> u32 {
        order_book_checksum(&self.bids, &self.asks)
    }

    pub fn market_id(&self) -> MarketId {
        self.market_id
    }

    pub fn bids(&self) -> &BookSide {
        &self.bids
    }

    pub fn asks(&self) -> &BookSide {
        &self.asks
    }

    pub fn state(&self) -> LedgerState {
        self.state
    }

    pub fn is_divergent(&self) -> bool {
        self.state == LedgerState::Divergent
    }

    pub fn last_verified_checksum(&self) -> Option<u32> {
        self.last_verified_checksum
    }
}
