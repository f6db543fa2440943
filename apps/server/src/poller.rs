//! Background loops: chain poller and spread scanner.
//!
//! Both loops run until the running flag is cleared. A failed cycle is
//! logged and the loop carries on with its schedule.

use crate::config::{ConfigError, RpcSettings, ScannerSettings};
use crate::state::SharedState;
use chainwatch_core::TradingPair;
use chainwatch_engine::{PriceSource, SimulatedPriceSource, SpreadScanner};
use chainwatch_rpc::{ConnectionState, FallbackConnectionManager, RpcResult, RpcTransport};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub fn build_manager(
    settings: &RpcSettings,
    transport: Arc<dyn RpcTransport>,
) -> Result<FallbackConnectionManager, ConfigError> {
    let pool = settings.endpoint_pool()?;
    FallbackConnectionManager::new(pool, transport, settings.manager_config())
        .map_err(|e| ConfigError::Invalid(e.to_string()))
}

/// Scanner over two simulated venues.
pub fn build_scanner(settings: &ScannerSettings) -> SpreadScanner {
    let source = |name: &str, offset: u64| -> Arc<dyn PriceSource> {
        let source = match settings.seed {
            Some(seed) => SimulatedPriceSource::seeded(name, seed.wrapping_add(offset)),
            None => SimulatedPriceSource::new(name),
        };
        Arc::new(source.with_max_jitter_bps(settings.max_jitter_bps))
    };

    SpreadScanner::new(source("venue-a", 0), source("venue-b", 1), settings.scanner_config())
}

/// One chain poll: reconnect when disconnected, otherwise read the height.
/// The resulting status is published to `state` either way.
pub async fn poll_chain_once(
    manager: &mut FallbackConnectionManager,
    state: &SharedState,
) -> RpcResult<u64> {
    let result = if manager.state() == ConnectionState::Disconnected {
        manager.connect().await.map(|r| r.value)
    } else {
        manager.get_chain_height().await
    };

    state.stats.record_poll(result.is_ok());
    state.publish_chain_status(manager.status()).await;
    result
}

pub async fn run_chain_poller(
    mut manager: FallbackConnectionManager,
    state: SharedState,
    interval: Duration,
) {
    info!(
        endpoints = manager.pool().len(),
        quorum = manager.config().quorum,
        "Starting chain poller"
    );

    while state.is_running() {
        match poll_chain_once(&mut manager, &state).await {
            Ok(height) => debug!(height, "Chain height"),
            // Transient failures were already reported by the manager.
            Err(e) if e.is_transient() => debug!(error = %e, "Chain poll failed"),
            Err(e) => warn!(error = %e, "Chain poll failed"),
        }
        tokio::time::sleep(interval).await;
    }

    info!("Chain poller stopped");
}

/// One scan cycle. Returns the number of differences found.
pub async fn scan_once(scanner: &mut SpreadScanner, pairs: &[TradingPair], state: &SharedState) -> usize {
    let found = scanner.scan(pairs).await;
    state.stats.record_scan(found.len());

    if let Some(latest) = found.last() {
        state.set_last_difference(latest.clone()).await;
    }
    found.len()
}

pub async fn run_scanner_loop(
    mut scanner: SpreadScanner,
    pairs: Vec<TradingPair>,
    state: SharedState,
    interval: Duration,
) {
    info!(pairs = pairs.len(), "Starting spread scanner");

    while state.is_running() {
        scan_once(&mut scanner, &pairs, &state).await;
        tokio::time::sleep(interval).await;
    }

    info!("Spread scanner stopped");
}
