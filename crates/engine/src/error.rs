//! Error types for price sources.

use chainwatch_core::TradingPair;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PriceError {
    #[error("price source {source_name} unavailable: {reason}")]
    Unavailable { source_name: String, reason: String },

    #[error("no price for {0}")]
    UnknownPair(TradingPair),
}

/// Result type for price lookups.
pub type PriceResult<T> = Result<T, PriceError>;
