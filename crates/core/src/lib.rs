//! Core data types shared across the chainwatch crates.

pub mod opportunity;
pub mod pair;
pub mod price;

pub use opportunity::*;
pub use pair::*;
pub use price::*;

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
