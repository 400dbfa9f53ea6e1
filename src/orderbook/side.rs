//! One side of the order book and the level patcher

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Level, Price, Quantity};

/// Price to quantity mapping for one side of the book.
///
/// Never holds a zero quantity: a level patched to zero is removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookSide {
    levels: BTreeMap<Price, Quantity>,
}

impl BookSide {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a batch of absolute level quantities in array order.
    ///
    /// A zero quantity removes the price (no-op if absent); any other value
    /// replaces whatever was resting there.
    pub fn patch(&mut self, levels: &[Level]) {
        for level in levels {
            if level.quantity.is_zero() {
                self.levels.remove(&level.price);
            } else {
                self.levels.insert(level.price.clone(), level.quantity.clone());
            }
        }
    }

    pub fn get(&self, price: &Price) -> Option<&Quantity> {
        self.levels.get(price)
    }

    pub fn contains(&self, price: &Price) -> bool {
        self.levels.contains_key(price)
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Levels from the lowest price up
    pub fn ascending(&self) -> impl DoubleEndedIterator<Item = (&Price, &Quantity)> {
        self.levels.iter()
    }

    /// Levels from the highest price down
    pub fn descending(&self) -> impl Iterator<Item = (&Price, &Quantity)> {
        self.levels.iter().rev()
    }
}

impl FromIterator<Level> for BookSide {
    fn from_iter<I: IntoIterator<Item = Level>>(iter: I) -> Self {
        let levels: Vec<Level> = iter.into_iter().collect();
        let mut side = BookSide::new();
        side.patch(&levels);
        side
    }
}
