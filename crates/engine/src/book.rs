//! Latest price per (source, pair).

use chainwatch_core::{FixedPoint, TradingPair};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

type BookKey = (String, TradingPair);

/// One source's latest price for a pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceQuote {
    pub source: String,
    pub price: FixedPoint,
}

/// Thread-safe store of the most recent quote from each source.
///
/// Clones share storage, so the scanner can write while readers elsewhere
/// hold their own handle.
#[derive(Debug, Clone, Default)]
pub struct PriceBook {
    prices: Arc<DashMap<BookKey, FixedPoint>>,
}

impl PriceBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, source: &str, pair: &TradingPair, price: FixedPoint) {
        self.prices.insert((source.to_string(), pair.clone()), price);
    }

    /// All quotes for a pair, sorted by source name.
    pub fn prices_for_pair(&self, pair: &TradingPair) -> Vec<SourceQuote> {
        let mut quotes: Vec<_> = self
            .prices
            .iter()
            .filter(|r| &r.key().1 == pair)
            .map(|r| SourceQuote {
                source: r.key().0.clone(),
                price: *r.value(),
            })
            .collect();
        quotes.sort_by(|a, b| a.source.cmp(&b.source));
        quotes
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}
