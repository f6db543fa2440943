//! Price difference records produced by the spread scanner.

use crate::{FixedPoint, TradingPair};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

static DIFFERENCE_ID: AtomicU64 = AtomicU64::new(1);

/// A price difference for one pair between two price sources.
///
/// `buy_source` is the cheaper side. No fees, depth or transfer paths are
/// considered, so this is an observation rather than an executable trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceDifference {
    pub id: u64,
    pub pair: TradingPair,
    pub buy_source: String,
    pub sell_source: String,
    pub buy_price: FixedPoint,
    pub sell_price: FixedPoint,
    /// (sell - buy) / buy in basis points, never negative.
    pub spread_bps: i32,
    pub detected_at_ms: u64,
}

impl PriceDifference {
    /// Build a record from two quotes, ordering the sides so that the
    /// cheaper source is the buy side.
    pub fn from_quotes(
        pair: TradingPair,
        (source_a, price_a): (&str, FixedPoint),
        (source_b, price_b): (&str, FixedPoint),
    ) -> Self {
        let ((buy_source, buy_price), (sell_source, sell_price)) = if price_a <= price_b {
            ((source_a, price_a), (source_b, price_b))
        } else {
            ((source_b, price_b), (source_a, price_a))
        };

        Self {
            id: DIFFERENCE_ID.fetch_add(1, Ordering::Relaxed),
            pair,
            buy_source: buy_source.to_string(),
            sell_source: sell_source.to_string(),
            buy_price,
            sell_price,
            spread_bps: FixedPoint::premium_bps(buy_price, sell_price),
            detected_at_ms: crate::now_ms(),
        }
    }

    /// Spread as a percentage.
    pub fn spread_pct(&self) -> f64 {
        self.spread_bps as f64 / 100.0
    }

    pub fn meets_threshold(&self, min_spread_bps: i32) -> bool {
        self.spread_bps >= min_spread_bps
    }
}
