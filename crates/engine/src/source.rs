//! Price sources.

use crate::error::{PriceError, PriceResult};
use async_trait::async_trait;
use chainwatch_core::{FixedPoint, TradingPair};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::Mutex;

/// Anything that can quote a price for a trading pair.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Short identifier used in logs and price difference records.
    fn name(&self) -> &str;

    /// Current price of one unit of `pair.base` in `pair.quote`.
    async fn fetch_price(&self, pair: &TradingPair) -> PriceResult<FixedPoint>;
}

/// Reference prices for the default pairs.
fn default_references() -> HashMap<TradingPair, FixedPoint> {
    [
        ("ETH", "USDC", 3_000.0),
        ("WBTC", "USDC", 60_000.0),
        ("ETH", "DAI", 3_000.0),
        ("LINK", "ETH", 0.005),
        ("UNI", "ETH", 0.002),
    ]
    .into_iter()
    .map(|(base, quote, price)| (TradingPair::new(base, quote), FixedPoint::from_f64(price)))
    .collect()
}

/// Random prices scattered around a per-pair reference.
///
/// Each quote is the reference shifted by a uniformly drawn offset in
/// `[-max_jitter_bps, max_jitter_bps]`.
#[derive(Debug)]
pub struct SimulatedPriceSource {
    name: String,
    references: HashMap<TradingPair, FixedPoint>,
    max_jitter_bps: u32,
    rng: Mutex<StdRng>,
}

impl SimulatedPriceSource {
    pub const DEFAULT_MAX_JITTER_BPS: u32 = 50;

    /// Source seeded from OS entropy, quoting the default pairs.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_rng(name, StdRng::from_entropy())
    }

    /// Deterministic source for tests and reproducible runs.
    pub fn seeded(name: impl Into<String>, seed: u64) -> Self {
        Self::with_rng(name, StdRng::seed_from_u64(seed))
    }

    fn with_rng(name: impl Into<String>, rng: StdRng) -> Self {
        Self {
            name: name.into(),
            references: default_references(),
            max_jitter_bps: Self::DEFAULT_MAX_JITTER_BPS,
            rng: Mutex::new(rng),
        }
    }

    pub fn with_max_jitter_bps(mut self, max_jitter_bps: u32) -> Self {
        self.max_jitter_bps = max_jitter_bps;
        self
    }

    /// Add or replace the reference price of a pair.
    pub fn with_reference(mut self, pair: TradingPair, price: FixedPoint) -> Self {
        self.references.insert(pair, price);
        self
    }

    pub fn max_jitter_bps(&self) -> u32 {
        self.max_jitter_bps
    }

    pub fn reference(&self, pair: &TradingPair) -> Option<FixedPoint> {
        self.references.get(pair).copied()
    }

    fn jitter_bps(&self) -> PriceResult<i32> {
        let max = self.max_jitter_bps.min(i32::MAX as u32) as i32;
        let mut rng = self.rng.lock().map_err(|_| PriceError::Unavailable {
            source_name: self.name.clone(),
            reason: "random generator poisoned".to_string(),
        })?;
        Ok(rng.gen_range(-max..=max))
    }
}

#[async_trait]
impl PriceSource for SimulatedPriceSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_price(&self, pair: &TradingPair) -> PriceResult<FixedPoint> {
        let reference = self
            .reference(pair)
            .ok_or_else(|| PriceError::UnknownPair(pair.clone()))?;
        Ok(reference.shifted_bps(self.jitter_bps()?))
    }
}
