//! Trading pair definitions.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when a pair string is not `BASE/QUOTE`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid trading pair '{0}', expected BASE/QUOTE")]
pub struct PairParseError(pub String);

/// Trading pair of base/quote symbols, e.g. ETH/USDC.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TradingPair {
    /// Base asset symbol (ETH in ETH/USDC)
    pub base: CompactString,
    /// Quote asset symbol (USDC in ETH/USDC)
    pub quote: CompactString,
}

impl TradingPair {
    pub fn new(base: &str, quote: &str) -> Self {
        Self {
            base: CompactString::new(base.to_uppercase()),
            quote: CompactString::new(quote.to_uppercase()),
        }
    }

    /// Canonical `BASE/QUOTE` form.
    pub fn symbol(&self) -> String {
        format!("{}/{}", self.base, self.quote)
    }

    /// Pairs scanned when the configuration does not name any.
    pub fn defaults() -> Vec<TradingPair> {
        vec![
            TradingPair::new("ETH", "USDC"),
            TradingPair::new("WBTC", "USDC"),
            TradingPair::new("ETH", "DAI"),
            TradingPair::new("LINK", "ETH"),
            TradingPair::new("UNI", "ETH"),
        ]
    }
}

impl fmt::Display for TradingPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

impl FromStr for TradingPair {
    type Err = PairParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (base, quote) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| PairParseError(s.to_string()))?;
        let (base, quote) = (base.trim(), quote.trim());
        if base.is_empty() || quote.is_empty() || quote.contains('/') {
            return Err(PairParseError(s.to_string()));
        }
        Ok(TradingPair::new(base, quote))
    }
}
