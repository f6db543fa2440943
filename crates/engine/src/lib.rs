//! Price difference scanning.
//!
//! Prices come from pluggable [`PriceSource`] implementations. The shipped
//! [`SimulatedPriceSource`] produces random prices around a reference; the
//! [`SpreadScanner`] compares two sources pair by pair.

pub mod book;
pub mod error;
pub mod scanner;
pub mod source;

pub use book::*;
pub use error::*;
pub use scanner::*;
pub use source::*;
