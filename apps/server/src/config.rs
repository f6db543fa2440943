//! Application configuration.

use chainwatch_core::TradingPair;
use chainwatch_engine::ScannerConfig;
use chainwatch_rpc::{EndpointPool, ManagerConfig, DEFAULT_ENDPOINTS};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Environment variable holding the preferred RPC endpoint.
pub const PRIMARY_RPC_ENV: &str = "PRIMARY_RPC_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Chain poller and connection manager settings.
    pub rpc: RpcSettings,
    /// Spread scanner settings.
    pub scanner: ScannerSettings,
    /// Status API settings.
    pub http: HttpSettings,
    /// Logging level.
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rpc: RpcSettings::default(),
            scanner: ScannerSettings::default(),
            http: HttpSettings::default(),
            log_level: "info".to_string(),
        }
    }
}

/// RPC settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcSettings {
    /// Endpoint URLs in priority order.
    pub endpoints: Vec<String>,
    /// Preferred endpoint placed ahead of `endpoints`.
    pub primary: Option<String>,
    /// Endpoints that must answer or agree.
    pub quorum: usize,
    /// Per-endpoint request timeout in milliseconds.
    pub request_timeout_ms: u64,
    /// Delay between chain polls in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for RpcSettings {
    fn default() -> Self {
        Self {
            endpoints: DEFAULT_ENDPOINTS.iter().map(|s| s.to_string()).collect(),
            primary: None,
            quorum: 1,
            request_timeout_ms: 5000,
            poll_interval_ms: 12_000,
        }
    }
}

impl RpcSettings {
    pub fn endpoint_pool(&self) -> Result<EndpointPool, ConfigError> {
        EndpointPool::new(&self.endpoints, self.primary.as_deref())
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig::default()
            .with_quorum(self.quorum)
            .with_request_timeout(Duration::from_millis(self.request_timeout_ms))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Spread scanner settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerSettings {
    /// Pairs to scan, as `BASE/QUOTE`.
    pub pairs: Vec<String>,
    /// Minimum spread in basis points.
    pub min_spread_bps: i32,
    /// Maximum random offset of simulated prices.
    pub max_jitter_bps: u32,
    /// Scan interval in milliseconds.
    pub scan_interval_ms: u64,
    /// Fixed seed for simulated prices. Entropy when unset.
    pub seed: Option<u64>,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self {
            pairs: TradingPair::defaults().iter().map(TradingPair::symbol).collect(),
            min_spread_bps: 30,
            max_jitter_bps: 50,
            scan_interval_ms: 2000,
            seed: None,
        }
    }
}

impl ScannerSettings {
    pub fn trading_pairs(&self) -> Result<Vec<TradingPair>, ConfigError> {
        self.pairs
            .iter()
            .map(|p| {
                p.parse::<TradingPair>()
                    .map_err(|e| ConfigError::Invalid(e.to_string()))
            })
            .collect()
    }

    pub fn scanner_config(&self) -> ScannerConfig {
        ScannerConfig {
            min_spread_bps: self.min_spread_bps,
        }
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }
}

/// Status API settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub port: u16,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self { port: 3000 }
    }
}

impl AppConfig {
    /// Load from a JSON file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Use `primary` as the preferred endpoint unless one is already set.
    pub fn apply_primary(&mut self, primary: Option<String>) {
        if self.rpc.primary.is_none() {
            self.rpc.primary = primary.filter(|p| !p.trim().is_empty());
        }
    }

    /// Check the settings that the libraries cannot check on their own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rpc.quorum == 0 {
            return Err(ConfigError::Invalid("rpc.quorum must be at least 1".to_string()));
        }
        if self.rpc.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid("rpc.request_timeout_ms must be positive".to_string()));
        }
        if self.rpc.poll_interval_ms == 0 || self.scanner.scan_interval_ms == 0 {
            return Err(ConfigError::Invalid("intervals must be positive".to_string()));
        }
        self.rpc.endpoint_pool()?;
        self.scanner.trading_pairs()?;
        Ok(())
    }
}
