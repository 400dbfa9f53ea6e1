//! Scalar types carried by the order book
//!
//! Prices and quantities arrive as base-10 strings of fixed-point (18 decimal)
//! amounts. Both are held as arbitrary-precision unsigned integers so that
//! equality and ordering are exact.

use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::SyncError;

/// Number of implied decimals in wire prices and quantities
pub const FIXED_POINT_DECIMALS: u32 = 18;

/// Parse a plain base-10 unsigned integer. Signs, separators, whitespace and
/// fractional parts are rejected.
fn parse_unsigned(raw: &str, what: &str) -> Result<BigUint, SyncError> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SyncError::InvalidLevel(format!("{what} {raw:?} is not an unsigned integer")));
    }
    BigUint::from_str(raw).map_err(|e| SyncError::InvalidLevel(format!("{what} {raw:?}: {e}")))
}

/// Price of a level, ordered numerically
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Price(BigUint);

impl Price {
    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }
}

impl From<u64> for Price {
    fn from(value: u64) -> Self {
        Price(BigUint::from(value))
    }
}

impl FromStr for Price {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_unsigned(s, "price").map(Price)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Absolute quantity resting at a level
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quantity(BigUint);

impl Quantity {
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }

    pub fn into_biguint(self) -> BigUint {
        self.0
    }
}

impl From<u64> for Quantity {
    fn from(value: u64) -> Self {
        Quantity(BigUint::from(value))
    }
}

impl From<BigUint> for Quantity {
    fn from(value: BigUint) -> Self {
        Quantity(value)
    }
}

impl FromStr for Quantity {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_unsigned(s, "quantity").map(Quantity)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

macro_rules! string_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

string_serde!(Price);
string_serde!(Quantity);

/// A single (price, quantity) level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    pub price: Price,
    pub quantity: Quantity,
}

impl Level {
    /// Level from raw fixed-point integers that fit in a `u64`
    pub fn new(price: u64, quantity: u64) -> Self {
        Self {
            price: Price::from(price),
            quantity: Quantity::from(quantity),
        }
    }
}

/// Exchange market identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarketId(pub u64);

impl FromStr for MarketId {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(MarketId)
            .map_err(|e| SyncError::ParseError(format!("market id {s:?}: {e}")))
    }
}

impl fmt::Display for MarketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
