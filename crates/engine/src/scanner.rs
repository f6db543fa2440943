//! Spread scanner.
//!
//! Compares two price sources over a list of pairs and records price
//! differences that reach a configured spread.

use crate::book::PriceBook;
use crate::error::PriceResult;
use crate::source::PriceSource;
use chainwatch_core::{FixedPoint, PriceDifference, TradingPair};
use futures_util::future::join_all;
use std::sync::Arc;
use tracing::{debug, info};

/// Configuration for the spread scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannerConfig {
    /// Minimum spread in basis points to record a difference.
    pub min_spread_bps: i32,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self { min_spread_bps: 30 }
    }
}

/// Scans pairs across two price sources.
pub struct SpreadScanner {
    config: ScannerConfig,
    first: Arc<dyn PriceSource>,
    second: Arc<dyn PriceSource>,
    book: PriceBook,
    last_difference: Option<PriceDifference>,
}

impl SpreadScanner {
    pub fn new(first: Arc<dyn PriceSource>, second: Arc<dyn PriceSource>, config: ScannerConfig) -> Self {
        Self {
            config,
            first,
            second,
            book: PriceBook::new(),
            last_difference: None,
        }
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// Latest quotes seen from either source. Clone it to read elsewhere
    /// while the scanner keeps writing.
    pub fn book(&self) -> &PriceBook {
        &self.book
    }

    /// Most recent difference at or above the threshold, across all scans.
    pub fn last_difference(&self) -> Option<&PriceDifference> {
        self.last_difference.as_ref()
    }

    /// Scan every pair once and return the differences found this cycle.
    ///
    /// Both sources are queried concurrently for all pairs. A pair whose
    /// price cannot be fetched from either source is skipped.
    pub async fn scan(&mut self, pairs: &[TradingPair]) -> Vec<PriceDifference> {
        let quotes = join_all(pairs.iter().map(|pair| self.fetch_pair(pair))).await;

        let mut found = Vec::new();
        for (pair, (first, second)) in pairs.iter().zip(quotes) {
            let (first_price, second_price) = match (first, second) {
                (Ok(a), Ok(b)) => (a, b),
                (Err(e), _) | (_, Err(e)) => {
                    debug!(pair = %pair, error = %e, "Skipping pair");
                    continue;
                }
            };

            self.book.update(self.first.name(), pair, first_price);
            self.book.update(self.second.name(), pair, second_price);

            let difference = PriceDifference::from_quotes(
                pair.clone(),
                (self.first.name(), first_price),
                (self.second.name(), second_price),
            );

            if difference.meets_threshold(self.config.min_spread_bps) {
                info!(
                    pair = %difference.pair,
                    buy = %difference.buy_source,
                    sell = %difference.sell_source,
                    spread_bps = difference.spread_bps,
                    "Price difference detected"
                );
                found.push(difference);
            }
        }

        if let Some(latest) = found.last() {
            self.last_difference = Some(latest.clone());
        }
        found
    }

    async fn fetch_pair(&self, pair: &TradingPair) -> (PriceResult<FixedPoint>, PriceResult<FixedPoint>) {
        tokio::join!(self.first.fetch_price(pair), self.second.fetch_price(pair))
    }
}
