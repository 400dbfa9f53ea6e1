//! Order book module
//!
//! Maintains the reconciled two-sided book for the selected market.

mod ledger;
mod metrics;
mod side;
mod types;
mod view;

pub use ledger::{LedgerState, OrderBookLedger, UpdateOutcome};
pub use metrics::{quote_quantity, to_units, OrderBookMetrics};
pub use side::BookSide;
pub use types::{Level, MarketId, Price, Quantity, FIXED_POINT_DECIMALS};
pub use view::BookView;
