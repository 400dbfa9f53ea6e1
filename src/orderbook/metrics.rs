//! Order book metrics calculation

use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{BookSide, Price, Quantity, FIXED_POINT_DECIMALS};

/// Computed metrics for an order book view
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderBookMetrics {
    /// Highest bid price
    pub best_bid: Option<Price>,

    /// Lowest ask price
    pub best_ask: Option<Price>,

    /// Mid price in whole units (average of best bid and ask)
    pub mid_price: Option<Decimal>,

    /// Best ask minus best bid, in whole units
    pub spread: Option<Decimal>,

    /// Total bid quantity across all levels
    pub bid_depth: Quantity,

    /// Total ask quantity across all levels
    pub ask_depth: Quantity,

    /// Bid depth in quote terms
    pub bid_quote_depth: Quantity,

    /// Ask depth in quote terms
    pub ask_quote_depth: Quantity,

    /// Number of bid levels
    pub bid_levels: usize,

    /// Number of ask levels
    pub ask_levels: usize,

    /// Share of top-N quantity on the bid side, 0..=100
    pub buy_percentage: u8,

    /// Share of top-N quantity on the ask side, 0..=100
    pub sell_percentage: u8,

    /// Larger of the two top-N side totals
    pub highest_row_value: Quantity,
}

impl OrderBookMetrics {
    pub fn compute(bids: &BookSide, asks: &BookSide, depth: usize) -> Self {
        let best_bid = bids.descending().next().map(|(p, _)| p.clone());
        let best_ask = asks.ascending().next().map(|(p, _)| p.clone());

        let (mid_price, spread) = match (&best_bid, &best_ask) {
            (Some(bid), Some(ask)) => {
                let bid = to_units(bid.as_biguint());
                let ask = to_units(ask.as_biguint());
                match (bid, ask) {
                    (Some(bid), Some(ask)) => (
                        bid.checked_add(ask).map(|sum| sum / Decimal::from(2)),
                        ask.checked_sub(bid),
                    ),
                    _ => (None, None),
                }
            }
            _ => (None, None),
        };

        let top_bid = sum(bids.descending().take(depth).map(|(_, q)| q));
        let top_ask = sum(asks.ascending().take(depth).map(|(_, q)| q));
        let (buy_percentage, sell_percentage) = buy_sell_percentage(&top_bid, &top_ask);
        let highest_row_value = if top_ask > top_bid { top_ask } else { top_bid };

        Self {
            best_bid,
            best_ask,
            mid_price,
            spread,
            bid_depth: sum(bids.ascending().map(|(_, q)| q)).into(),
            ask_depth: sum(asks.ascending().map(|(_, q)| q)).into(),
            bid_quote_depth: quote_depth(bids),
            ask_quote_depth: quote_depth(asks),
            bid_levels: bids.len(),
            ask_levels: asks.len(),
            buy_percentage,
            sell_percentage,
            highest_row_value: highest_row_value.into(),
        }
    }

    /// Check if the book has both sides populated
    pub fn is_healthy(&self) -> bool {
        self.best_bid.is_some()
            && self.best_ask.is_some()
            && self.bid_levels > 0
            && self.ask_levels > 0
    }

    /// Check if the best bid is at or above the best ask
    pub fn is_crossed(&self) -> bool {
        matches!((&self.best_bid, &self.best_ask), (Some(bid), Some(ask)) if bid >= ask)
    }
}

/// Convert a base-denominated size into quote terms: `size * price / 10^18`.
pub fn quote_quantity(size: &Quantity, price: &Price) -> Quantity {
    let scale = BigUint::from(10u32).pow(FIXED_POINT_DECIMALS);
    (size.as_biguint() * price.as_biguint() / scale).into()
}

/// Convert a fixed-point amount into whole units, if it fits a `Decimal`
pub fn to_units(raw: &BigUint) -> Option<Decimal> {
    let mantissa = raw.to_i128()?;
    Decimal::try_from_i128_with_scale(mantissa, FIXED_POINT_DECIMALS)
        .ok()
        .map(|d| d.normalize())
}

fn sum<'a>(quantities: impl Iterator<Item = &'a Quantity>) -> BigUint {
    quantities.fold(BigUint::zero(), |acc, q| acc + q.as_biguint())
}

fn quote_depth(side: &BookSide) -> Quantity {
    side.ascending()
        .fold(BigUint::zero(), |acc, (p, q)| acc + quote_quantity(q, p).as_biguint())
        .into()
}

fn buy_sell_percentage(bid_total: &BigUint, ask_total: &BigUint) -> (u8, u8) {
    let total = bid_total + ask_total;
    if total.is_zero() {
        return (50, 50);
    }
    let buy = (bid_total * 100u32 / total).to_u8().unwrap_or(100);
    (buy, 100 - buy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::Level;
    use rust_decimal_macros::dec;

    const UNIT: u64 = 1_000_000_000_000_000_000;

    /// Fixed-point representation of a whole number of units
    fn units(n: u64) -> String {
        format!("{n}000000000000000000")
    }

    fn side(levels: &[(u64, u64)]) -> BookSide {
        levels.iter().map(|&(p, q)| Level::new(p, q)).collect()
    }

    fn unit_side(prices: &[u64]) -> BookSide {
        prices
            .iter()
            .map(|&p| Level {
                price: units(p).parse().unwrap(),
                quantity: Quantity::from(1),
            })
            .collect()
    }

    #[test]
    fn test_best_bid_ask_and_mid() {
        let bids = unit_side(&[100, 99]);
        let asks = unit_side(&[101, 102]);
        let metrics = OrderBookMetrics::compute(&bids, &asks, 10);
        assert_eq!(metrics.best_bid, Some(units(100).parse().unwrap()));
        assert_eq!(metrics.best_ask, Some(units(101).parse().unwrap()));
        assert_eq!(metrics.mid_price, Some(dec!(100.5)));
        assert_eq!(metrics.spread, Some(dec!(1)));
        assert!(metrics.is_healthy());
        assert!(!metrics.is_crossed());
    }

    #[test]
    fn test_crossed_book() {
        let metrics = OrderBookMetrics::compute(&unit_side(&[101]), &unit_side(&[100]), 10);
        assert!(metrics.is_crossed());
    }

    #[test]
    fn test_empty_book() {
        let metrics = OrderBookMetrics::compute(&BookSide::new(), &BookSide::new(), 10);
        assert_eq!(metrics.mid_price, None);
        assert_eq!((metrics.buy_percentage, metrics.sell_percentage), (50, 50));
        assert!(metrics.highest_row_value.is_zero());
        assert!(!metrics.is_healthy());
    }

    #[test]
    fn test_buy_sell_percentage_uses_top_levels_only() {
        let bids = side(&[(90, 30), (80, 1000)]);
        let asks = side(&[(100, 10), (110, 1000)]);
        let metrics = OrderBookMetrics::compute(&bids, &asks, 1);
        assert_eq!((metrics.buy_percentage, metrics.sell_percentage), (75, 25));
        assert_eq!(metrics.highest_row_value, Quantity::from(30));
        assert_eq!(metrics.bid_depth, Quantity::from(1030));
    }

    #[test]
    fn test_highest_row_value_picks_larger_side() {
        let bids = side(&[(90, 15), (80, 10)]);
        let asks = side(&[(100, 3)]);
        let metrics = OrderBookMetrics::compute(&bids, &asks, 5);
        assert_eq!(metrics.highest_row_value, Quantity::from(25));
    }

    #[test]
    fn test_quote_quantity() {
        let size = Quantity::from(2 * UNIT);
        let price = Price::from(3 * UNIT);
        assert_eq!(quote_quantity(&size, &price), Quantity::from(6 * UNIT));
    }

    #[test]
    fn test_quote_depth() {
        let bids: BookSide = [
            Level::new(2 * UNIT, 3 * UNIT),
            Level::new(UNIT, UNIT / 2),
        ]
        .into_iter()
        .collect();
        let asks: BookSide = [Level::new(4 * UNIT, UNIT)].into_iter().collect();
        let metrics = OrderBookMetrics::compute(&bids, &asks, 10);
        assert_eq!(metrics.bid_quote_depth, Quantity::from(6 * UNIT + UNIT / 2));
        assert_eq!(metrics.ask_quote_depth, Quantity::from(4 * UNIT));
        assert!(OrderBookMetrics::compute(&BookSide::new(), &asks, 10)
            .bid_quote_depth
            .is_zero());
    }

    #[test]
    fn test_to_units_overflow() {
        let huge = BigUint::from(10u32).pow(40);
        assert_eq!(to_units(&huge), None);
        assert_eq!(to_units(&BigUint::from(UNIT / 4)), Some(dec!(0.25)));
    }
}
