//! Parser module for order book feed messages
//!
//! Inbound messages are untrusted: every field may be missing or malformed, so
//! the envelope is decoded loosely first and the book payload is only decoded
//! once the message is known to belong to the order book channel.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{Result, SyncError};
use crate::orderbook::{Level, MarketId, Price, Quantity};

/// Channel name carrying order book snapshots and updates
pub const ORDERBOOK_CHANNEL: &str = "orderbook";

/// Kind of an order book message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    Snapshot,
    Update,
    Other(Option<String>),
}

/// Top-level message envelope
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub channel: Option<String>,

    /// Market id as sent at the top level (number or string)
    #[serde(default)]
    pub market_id: Option<Value>,

    #[serde(rename = "type", default)]
    pub kind: Option<String>,

    #[serde(default)]
    pub checksum: Option<Value>,

    #[serde(default)]
    pub data: Option<Value>,
}

/// A numeric field the feed sends either as a JSON number or as a string
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum WireNumber {
    Int(u64),
    Text(String),
}

impl WireNumber {
    fn market_id(&self) -> Option<MarketId> {
        match self {
            WireNumber::Int(n) => Some(MarketId(*n)),
            WireNumber::Text(s) => s.parse().ok().map(MarketId),
        }
    }

    fn price(&self) -> Result<Price> {
        match self {
            WireNumber::Int(n) => Ok(Price::from(*n)),
            WireNumber::Text(s) => s.parse(),
        }
    }

    fn quantity(&self) -> Result<Quantity> {
        match self {
            WireNumber::Int(n) => Ok(Quantity::from(*n)),
            WireNumber::Text(s) => s.parse(),
        }
    }
}

/// Price level as sent on the wire.
///
/// `order_count` and `block_number` also arrive here; serde skips them.
#[derive(Debug, Clone, Deserialize)]
pub struct RawLevel {
    pub price: WireNumber,
    pub quantity: WireNumber,
}

impl RawLevel {
    pub fn to_level(&self) -> Result<Level> {
        Ok(Level {
            price: self.price.price()?,
            quantity: self.quantity.quantity()?,
        })
    }
}

/// Book payload under `data`
#[derive(Debug, Clone, Deserialize)]
pub struct BookPayload {
    #[serde(default)]
    pub market_id: Option<WireNumber>,
    #[serde(default)]
    pub asks: Vec<RawLevel>,
    #[serde(default)]
    pub bids: Vec<RawLevel>,
}

/// Validate a whole batch of levels. One bad level rejects the batch.
pub fn decode_levels(raw: &[RawLevel]) -> Result<Vec<Level>> {
    raw.iter().map(RawLevel::to_level).collect()
}

impl Envelope {
    /// Parse a raw text frame
    pub fn parse(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn is_orderbook(&self) -> bool {
        self.channel.as_deref() == Some(ORDERBOOK_CHANNEL)
    }

    pub fn kind(&self) -> MessageKind {
        match self.kind.as_deref() {
            Some("snapshot") => MessageKind::Snapshot,
            Some("update") => MessageKind::Update,
            other => MessageKind::Other(other.map(str::to_string)),
        }
    }

    /// Decode the book payload, `None` if the message has none
    pub fn payload(&self) -> Result<Option<BookPayload>> {
        match &self.data {
            None | Some(Value::Null) => Ok(None),
            Some(value) => Ok(Some(BookPayload::deserialize(value)?)),
        }
    }

    /// Market the message refers to: the payload's id wins over the envelope's
    pub fn resolve_market_id(&self, payload: &BookPayload) -> Option<MarketId> {
        if let Some(id) = &payload.market_id {
            return id.market_id();
        }
        let top = self.market_id.as_ref()?;
        WireNumber::deserialize(top).ok()?.market_id()
    }

    /// Feed checksum, `None` when absent. Zero is a real checksum.
    pub fn checksum(&self) -> Result<Option<u32>> {
        match &self.checksum {
            None | Some(Value::Null) => Ok(None),
            Some(value) => value
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .map(Some)
                .ok_or_else(|| SyncError::ParseError(format!("invalid checksum {value}"))),
        }
    }
}

/// Subscribe request for one market's order book
pub fn subscribe_request(market_id: MarketId) -> String {
    json!({
        "method": "subscribe",
        "params": {
            "channel": ORDERBOOK_CHANNEL,
            "market_ids": [market_id.0],
        }
    })
    .to_string()
}

/// Unsubscribe request for the order book channel
pub fn unsubscribe_request() -> String {
    json!({
        "method": "unsubscribe",
        "params": { "channel": ORDERBOOK_CHANNEL }
    })
    .to_string()
}
