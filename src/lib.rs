//! Order book synchronization library
//!
//! Keeps a local two-sided order book for one selected market consistent with
//! a snapshot/delta WebSocket feed. Deltas are verified against a CRC32 of
//! the canonical book string and any divergence triggers a resubscription.

pub mod checksum;
pub mod config;
pub mod error;
pub mod orderbook;
pub mod parser;
pub mod publisher;
pub mod router;
pub mod server;
pub mod sync;
pub mod telemetry;
pub mod websocket;

pub use checksum::{crc32, order_book_checksum};
pub use config::Config;
pub use error::{Result, SyncError};
pub use orderbook::{
    BookSide, BookView, Level, MarketId, OrderBookLedger, OrderBookMetrics, Price, Quantity,
};
pub use publisher::Publisher;
pub use router::{route, Decision, SkipReason};
pub use server::{build_router, AppState};
pub use sync::{MessageSink, StreamEvent, SyncController, SyncState};
pub use telemetry::SyncTelemetry;
pub use websocket::{ConnectionState, WebSocketManager};
