//! Message decoder and router
//!
//! Turns one raw feed frame into exactly one of three decisions. Nothing that
//! happens while handling a frame escapes as an error: malformed or irrelevant
//! input becomes [`Decision::Skip`].

use tracing::{debug, trace, warn};

use crate::error::Result;
use crate::orderbook::{MarketId, OrderBookLedger, UpdateOutcome};
use crate::parser::{decode_levels, Envelope, MessageKind};

/// Why a frame was ignored
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Unparseable JSON or invalid field contents
    Malformed(String),
    /// Another channel (heartbeats, other feeds)
    OtherChannel,
    /// Order book message without a `data` payload
    MissingPayload,
    /// Traffic for a market other than the selected one
    MarketMismatch(Option<MarketId>),
    /// Neither snapshot nor update
    UnknownType(Option<String>),
    /// Update for a divergent ledger; only a snapshot can recover it
    AwaitingSnapshot,
}

/// Outcome of routing one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// No state change, nothing to publish
    Skip(SkipReason),
    /// Checksum divergence: the ledger holds unverified state until a fresh
    /// snapshot arrives
    Resubscribe { expected: u32, computed: u32 },
    /// The ledger is the new authoritative state
    Commit { is_snapshot: bool, checksum: Option<u32> },
}

impl Decision {
    /// Short label for logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            Decision::Skip(_) => "skip",
            Decision::Resubscribe { .. } => "resubscribe",
            Decision::Commit { .. } => "commit",
        }
    }
}

/// Route one raw frame against the ledger of the selected market.
///
/// A snapshot replaces `ledger` with a brand-new one. An update patches it in
/// place before verification and is not rolled back on a checksum mismatch.
pub fn route(raw: &str, ledger: &mut OrderBookLedger) -> Decision {
    let envelope = match Envelope::parse(raw) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "Failed to parse feed message");
            return Decision::Skip(SkipReason::Malformed(e.to_string()));
        }
    };

    if !envelope.is_orderbook() {
        trace!(channel = ?envelope.channel, "Ignoring message on other channel");
        return Decision::Skip(SkipReason::OtherChannel);
    }

    match route_orderbook(&envelope, ledger) {
        Ok(decision) => decision,
        Err(e) => {
            warn!(
                error = %e,
                market_id = %ledger.market_id(),
                "Error processing order book message"
            );
            Decision::Skip(SkipReason::Malformed(e.to_string()))
        }
    }
}

fn route_orderbook(envelope: &Envelope, ledger: &mut OrderBookLedger) -> Result<Decision> {
    let Some(payload) = envelope.payload()? else {
        return Ok(Decision::Skip(SkipReason::MissingPayload));
    };

    let market_id = envelope.resolve_market_id(&payload);
    if market_id != Some(ledger.market_id()) {
        debug!(
            got = ?market_id,
            selected = %ledger.market_id(),
            "Skipping message for another market"
        );
        return Ok(Decision::Skip(SkipReason::MarketMismatch(market_id)));
    }

    match envelope.kind() {
        MessageKind::Snapshot => {
            let bids = decode_levels(&payload.bids)?;
            let asks = decode_levels(&payload.asks)?;
            *ledger = OrderBookLedger::from_snapshot(ledger.market_id(), &bids, &asks);
            debug!(
                market_id = %ledger.market_id(),
                bid_levels = ledger.bids().len(),
                ask_levels = ledger.asks().len(),
                "Applied snapshot"
            );
            Ok(Decision::Commit {
                is_snapshot: true,
                checksum: None,
            })
        }
        MessageKind::Update => {
            if ledger.is_divergent() {
                trace!(market_id = %ledger.market_id(), "Dropping update while awaiting snapshot");
                return Ok(Decision::Skip(SkipReason::AwaitingSnapshot));
            }

            let checksum = envelope.checksum()?;
            let bids = decode_levels(&payload.bids)?;
            let asks = decode_levels(&payload.asks)?;

            match ledger.apply_update(&bids, &asks, checksum) {
                UpdateOutcome::Diverged { expected, computed } => {
                    warn!(
                        market_id = %ledger.market_id(),
                        expected,
                        computed,
                        "Checksum mismatch, resubscribing"
                    );
                    Ok(Decision::Resubscribe { expected, computed })
                }
                UpdateOutcome::Verified(checksum) => Ok(Decision::Commit {
                    is_snapshot: false,
                    checksum: Some(checksum),
                }),
                UpdateOutcome::Unverified => Ok(Decision::Commit {
                    is_snapshot: false,
                    checksum: None,
                }),
            }
        }
        MessageKind::Other(kind) => {
            debug!(kind = ?kind, "Skipping order book message of unknown type");
            Ok(Decision::Skip(SkipReason::UnknownType(kind)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::order_book_checksum;
    use crate::orderbook::{BookSide, LedgerState, Level, Price, Quantity};
    use serde_json::json;

    const MARKET: MarketId = MarketId(42);

    fn levels(pairs: &[(&str, &str)]) -> serde_json::Value {
        pairs
            .iter()
            .map(|(p, q)| json!({"price": p, "quantity": q, "order_count": 1, "block_number": 1}))
            .collect()
    }

    fn message(
        kind: &str,
        market: serde_json::Value,
        asks: &[(&str, &str)],
        bids: &[(&str, &str)],
        checksum: Option<u32>,
    ) -> String {
        let mut msg = json!({
            "channel": "orderbook",
            "market_id": market,
            "type": kind,
            "data": {"market_id": market, "asks": levels(asks), "bids": levels(bids)},
        });
        if let Some(checksum) = checksum {
            msg["checksum"] = json!(checksum);
        }
        msg.to_string()
    }

    fn snapshot(asks: &[(&str, &str)], bids: &[(&str, &str)]) -> String {
        message("snapshot", json!("42"), asks, bids, None)
    }

    fn update(asks: &[(&str, &str)], bids: &[(&str, &str)], checksum: Option<u32>) -> String {
        message("update", json!("42"), asks, bids, checksum)
    }

    #[test]
    fn test_malformed_json() {
        let mut ledger = OrderBookLedger::new(MARKET);
        assert!(matches!(route("not json", &mut ledger), Decision::Skip(SkipReason::Malformed(_))));
    }

    #[test]
    fn test_other_channel() {
        let mut ledger = OrderBookLedger::new(MARKET);
        let raw = json!({"channel": "trades", "type": "snapshot"}).to_string();
        assert_eq!(route(&raw, &mut ledger), Decision::Skip(SkipReason::OtherChannel));
        let heartbeat = json!({"channel": "heartbeat"}).to_string();
        assert_eq!(route(&heartbeat, &mut ledger), Decision::Skip(SkipReason::OtherChannel));
    }

    #[test]
    fn test_market_mismatch_always_skips() {
        let mut ledger = OrderBookLedger::from_snapshot(MARKET, &[Level::new(90, 3)], &[]);
        for kind in ["snapshot", "update"] {
            let raw = message(kind, json!(99), &[("100", "5")], &[], Some(0xDEAD_BEEF));
            assert_eq!(
                route(&raw, &mut ledger),
                Decision::Skip(SkipReason::MarketMismatch(Some(MarketId(99))))
            );
        }
        assert_eq!(ledger.bids().len(), 1);
        assert!(ledger.asks().is_empty());
    }

    #[test]
    fn test_payload_market_id_without_envelope_id() {
        let mut ledger = OrderBookLedger::new(MARKET);
        let raw = json!({
            "channel": "orderbook",
            "type": "snapshot",
            "data": {"market_id": 99, "asks": [], "bids": []},
        })
        .to_string();
        assert!(matches!(route(&raw, &mut ledger), Decision::Skip(SkipReason::MarketMismatch(_))));
    }

    #[test]
    fn test_missing_payload() {
        let mut ledger = OrderBookLedger::new(MARKET);
        let raw = json!({"channel": "orderbook", "market_id": 42, "type": "snapshot"}).to_string();
        assert_eq!(route(&raw, &mut ledger), Decision::Skip(SkipReason::MissingPayload));
    }

    #[test]
    fn test_snapshot_commits_fresh_ledger() {
        let mut ledger = OrderBookLedger::from_snapshot(MARKET, &[], &[Level::new(999, 1)]);
        let decision = route(&snapshot(&[("100", "5")], &[("90", "3")]), &mut ledger);
        assert_eq!(
            decision,
            Decision::Commit {
                is_snapshot: true,
                checksum: None
            }
        );
        assert!(!ledger.asks().contains(&Price::from(999)));
        assert_eq!(ledger.asks().get(&Price::from(100)), Some(&Quantity::from(5)));
        assert_eq!(ledger.bids().get(&Price::from(90)), Some(&Quantity::from(3)));
    }

    #[test]
    fn test_empty_snapshot() {
        let mut ledger = OrderBookLedger::new(MARKET);
        let decision = route(&snapshot(&[], &[]), &mut ledger);
        assert!(matches!(decision, Decision::Commit { is_snapshot: true, .. }));
        assert!(ledger.asks().is_empty() && ledger.bids().is_empty());
        assert_eq!(ledger.state(), LedgerState::Synced);
    }

    #[test]
    fn test_update_patches_existing_ledger() {
        let mut ledger = OrderBookLedger::from_snapshot(MARKET, &[], &[Level::new(100, 5)]);
        let decision = route(&update(&[("100", "8")], &[], None), &mut ledger);
        assert_eq!(
            decision,
            Decision::Commit {
                is_snapshot: false,
                checksum: None
            }
        );
        assert_eq!(ledger.asks().get(&Price::from(100)), Some(&Quantity::from(8)));
    }

    #[test]
    fn test_update_with_matching_checksum() {
        let mut ledger = OrderBookLedger::new(MARKET);
        let expected_bids: BookSide = [Level::new(90, 5)].into_iter().collect();
        let checksum = order_book_checksum(&expected_bids, &BookSide::new());
        let decision = route(&update(&[], &[("90", "5")], Some(checksum)), &mut ledger);
        assert_eq!(
            decision,
            Decision::Commit {
                is_snapshot: false,
                checksum: Some(checksum)
            }
        );
    }

    #[test]
    fn test_update_with_wrong_checksum() {
        let mut ledger = OrderBookLedger::new(MARKET);
        let decision = route(&update(&[], &[("90", "5")], Some(0xDEAD_BEEF)), &mut ledger);
        assert!(matches!(decision, Decision::Resubscribe { expected: 0xDEAD_BEEF, .. }));
        assert_eq!(ledger.bids().get(&Price::from(90)), Some(&Quantity::from(5)));
    }

    #[test]
    fn test_zero_checksum_is_verified() {
        let mut ledger = OrderBookLedger::from_snapshot(MARKET, &[Level::new(90, 5)], &[]);
        let decision = route(&update(&[], &[("90", "0")], Some(0)), &mut ledger);
        assert!(matches!(decision, Decision::Commit { checksum: Some(0), .. }));

        let mut ledger = OrderBookLedger::from_snapshot(MARKET, &[Level::new(90, 5)], &[]);
        let decision = route(&update(&[], &[("80", "1")], Some(0)), &mut ledger);
        assert!(matches!(decision, Decision::Resubscribe { expected: 0, .. }));
    }

    #[test]
    fn test_divergent_ledger_waits_for_snapshot() {
        let mut ledger = OrderBookLedger::from_snapshot(MARKET, &[Level::new(90, 5)], &[]);
        route(&update(&[], &[("90", "6")], Some(1)), &mut ledger);
        assert!(ledger.is_divergent());

        let decision = route(&update(&[], &[("90", "7")], None), &mut ledger);
        assert_eq!(decision, Decision::Skip(SkipReason::AwaitingSnapshot));
        assert_eq!(ledger.bids().get(&Price::from(90)), Some(&Quantity::from(6)));

        let decision = route(&snapshot(&[], &[("90", "7")]), &mut ledger);
        assert!(matches!(decision, Decision::Commit { is_snapshot: true, .. }));
        assert_eq!(ledger.state(), LedgerState::Synced);
    }

    #[test]
    fn test_malformed_level_skips_without_mutation() {
        let mut ledger = OrderBookLedger::from_snapshot(MARKET, &[], &[Level::new(100, 5)]);
        let decision = route(&update(&[("100", "0"), ("101", "1.5")], &[], None), &mut ledger);
        assert!(matches!(decision, Decision::Skip(SkipReason::Malformed(_))));
        assert_eq!(ledger.asks().get(&Price::from(100)), Some(&Quantity::from(5)));
    }

    #[test]
    fn test_unused_level_fields_are_ignored() {
        for order_count in [json!("3"), json!(-1), json!(1.5), json!(null)] {
            let mut ledger = OrderBookLedger::from_snapshot(MARKET, &[], &[Level::new(100, 5)]);
            let raw = json!({
                "channel": "orderbook",
                "market_id": 42,
                "type": "update",
                "data": {
                    "market_id": 42,
                    "asks": [{
                        "price": "100",
                        "quantity": "8",
                        "order_count": order_count,
                        "block_number": "0x1f",
                    }],
                    "bids": [],
                },
            })
            .to_string();
            assert_eq!(
                route(&raw, &mut ledger),
                Decision::Commit {
                    is_snapshot: false,
                    checksum: None
                }
            );
            assert_eq!(ledger.asks().get(&Price::from(100)), Some(&Quantity::from(8)));
        }
    }

    #[test]
    fn test_unknown_type() {
        let mut ledger = OrderBookLedger::new(MARKET);
        let raw = message("delta", json!(42), &[], &[], None);
        assert_eq!(
            route(&raw, &mut ledger),
            Decision::Skip(SkipReason::UnknownType(Some("delta".to_string())))
        );
    }
}
