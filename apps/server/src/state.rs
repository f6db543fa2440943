//! Application state management.

use chainwatch_core::{now_ms, PriceDifference, TradingPair};
use chainwatch_engine::{PriceBook, SourceQuote};
use chainwatch_rpc::{ConnectionState, ConnectionStatus};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Counters for the background loops.
#[derive(Debug, Default)]
pub struct ServiceStats {
    /// Chain polls attempted.
    pub polls: AtomicU64,
    /// Chain polls that ended in a manager-level error.
    pub poll_failures: AtomicU64,
    /// Completed scanner cycles.
    pub scans: AtomicU64,
    /// Price differences at or above the threshold.
    pub differences_detected: AtomicU64,
    /// Start time in milliseconds.
    pub started_at_ms: AtomicU64,
}

impl ServiceStats {
    pub fn new() -> Self {
        Self {
            started_at_ms: AtomicU64::new(now_ms()),
            ..Default::default()
        }
    }

    pub fn record_poll(&self, success: bool) {
        self.polls.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.poll_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_scan(&self, differences: usize) {
        self.scans.fetch_add(1, Ordering::Relaxed);
        self.differences_detected
            .fetch_add(differences as u64, Ordering::Relaxed);
    }

    pub fn uptime_secs(&self) -> u64 {
        now_ms().saturating_sub(self.started_at_ms.load(Ordering::Relaxed)) / 1000
    }

    pub fn summary(&self) -> StatsSummary {
        StatsSummary {
            polls: self.polls.load(Ordering::Relaxed),
            poll_failures: self.poll_failures.load(Ordering::Relaxed),
            scans: self.scans.load(Ordering::Relaxed),
            differences_detected: self.differences_detected.load(Ordering::Relaxed),
            uptime_secs: self.uptime_secs(),
        }
    }
}

/// Summary of statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSummary {
    pub polls: u64,
    pub poll_failures: u64,
    pub scans: u64,
    pub differences_detected: u64,
    pub uptime_secs: u64,
}

/// Body of `GET /status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub state: ConnectionState,
    /// Connected or degraded.
    pub healthy: bool,
    pub last_known_height: Option<u64>,
    pub uptime_secs: u64,
    pub polls: u64,
    pub poll_failures: u64,
    pub endpoints: Vec<String>,
}

/// Application state shared across components.
///
/// The connection manager itself is owned by the chain poller; this only
/// holds the snapshot it publishes.
pub struct AppState {
    /// Endpoint URLs in priority order.
    pub endpoints: Vec<String>,
    /// Service statistics.
    pub stats: ServiceStats,
    /// Running flag.
    pub running: AtomicBool,
    /// Latest scanner quotes, shared with the scanner.
    prices: PriceBook,
    chain: RwLock<ConnectionStatus>,
    last_difference: RwLock<Option<PriceDifference>>,
}

impl AppState {
    pub fn new(endpoints: Vec<String>, prices: PriceBook) -> Self {
        Self {
            endpoints,
            stats: ServiceStats::new(),
            running: AtomicBool::new(false),
            prices,
            chain: RwLock::new(ConnectionStatus {
                state: ConnectionState::Disconnected,
                last_known_height: None,
            }),
            last_difference: RwLock::new(None),
        }
    }

    pub fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub async fn publish_chain_status(&self, status: ConnectionStatus) {
        *self.chain.write().await = status;
    }

    pub async fn chain_status(&self) -> ConnectionStatus {
        *self.chain.read().await
    }

    pub async fn set_last_difference(&self, difference: PriceDifference) {
        *self.last_difference.write().await = Some(difference);
    }

    pub async fn last_difference(&self) -> Option<PriceDifference> {
        self.last_difference.read().await.clone()
    }

    pub async fn status_report(&self) -> StatusReport {
        let chain = self.chain_status().await;
        let stats = self.stats.summary();
        StatusReport {
            state: chain.state,
            healthy: chain.state.is_healthy(),
            last_known_height: chain.last_known_height,
            uptime_secs: stats.uptime_secs,
            polls: stats.polls,
            poll_failures: stats.poll_failures,
            endpoints: self.endpoints.clone(),
        }
    }

    pub fn stats_summary(&self) -> StatsSummary {
        self.stats.summary()
    }

    /// Latest quote from each source for `pair`.
    pub fn quotes_for_pair(&self, pair: &TradingPair) -> Vec<SourceQuote> {
        self.prices.prices_for_pair(pair)
    }
}

/// Shared state handle.
pub type SharedState = Arc<AppState>;

pub fn create_state(endpoints: Vec<String>, prices: PriceBook) -> SharedState {
    Arc::new(AppState::new(endpoints, prices))
}
