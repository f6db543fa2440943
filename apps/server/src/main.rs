//! chainwatch - chain height monitor
//!
//! Polls a pool of public JSON-RPC endpoints through a quorum-based fallback
//! connection manager, scans simulated venues for price differences, and
//! serves both over a small HTTP status API.

mod config;
mod http_server;
mod poller;
mod state;

use chainwatch_rpc::HttpTransport;
use clap::Parser;
use config::{AppConfig, PRIMARY_RPC_ENV};
use state::create_state;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// chainwatch CLI
#[derive(Parser, Debug)]
#[command(name = "chainwatch")]
#[command(about = "Chain height monitor with quorum RPC failover", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config.json")]
    config: String,

    /// Log level: trace, debug, info, warn, error (overrides the config file)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Status API port (overrides the config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Preferred RPC endpoint, tried ahead of the configured list
    #[arg(long)]
    primary_rpc: Option<String>,

    /// Endpoints that must answer or agree (overrides the config file)
    #[arg(short, long)]
    quorum: Option<usize>,
}

impl Args {
    /// Apply command-line overrides on top of the loaded configuration.
    fn apply(&self, config: &mut AppConfig) {
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(port) = self.port {
            config.http.port = port;
        }
        if let Some(quorum) = self.quorum {
            config.rpc.quorum = quorum;
        }
        config.apply_primary(self.primary_rpc.clone());
    }
}

fn parse_level(level: &str) -> Level {
    match level {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn init_logging(level: &str) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(parse_level(level))
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

#[tokio::main]
async fn main() {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let mut config = match AppConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            init_logging(args.log_level.as_deref().unwrap_or("info"));
            error!("Failed to load {}: {}", args.config, e);
            return;
        }
    };
    args.apply(&mut config);
    init_logging(&config.log_level);
    // The config file and CLI win over the environment.
    config.apply_primary(std::env::var(PRIMARY_RPC_ENV).ok());

    if let Err(e) = config.validate() {
        error!("{}", e);
        return;
    }

    let transport = match HttpTransport::new() {
        Ok(transport) => Arc::new(transport),
        Err(e) => {
            error!("Failed to create HTTP client: {}", e);
            return;
        }
    };
    let manager = match poller::build_manager(&config.rpc, transport) {
        Ok(manager) => manager,
        Err(e) => {
            error!("{}", e);
            return;
        }
    };
    let pairs = match config.scanner.trading_pairs() {
        Ok(pairs) => pairs,
        Err(e) => {
            error!("{}", e);
            return;
        }
    };
    let scanner = poller::build_scanner(&config.scanner);

    info!("chainwatch starting...");
    info!("  Endpoints: {}", manager.pool().len());
    for endpoint in manager.pool().endpoints() {
        info!("    #{} {}", endpoint.priority, endpoint.url);
    }
    info!("  Quorum: {}", config.rpc.quorum);
    info!("  Pairs: {}", config.scanner.pairs.join(", "));
    info!("  Min Spread: {} bps", config.scanner.min_spread_bps);
    info!("  HTTP Port: {}", config.http.port);

    let endpoints = manager
        .pool()
        .urls()
        .into_iter()
        .map(str::to_string)
        .collect();
    let poll_interval = config.rpc.poll_interval();
    let scan_interval = config.scanner.scan_interval();
    let port = config.http.port;

    let state = create_state(endpoints, scanner.book().clone());
    state.start();

    if let Err(e) = http_server::start_http_server(state.clone(), port).await {
        error!("Failed to start status API: {}", e);
        return;
    }

    let poller_state = state.clone();
    let poller_handle = tokio::spawn(async move {
        poller::run_chain_poller(manager, poller_state, poll_interval).await;
    });

    let scanner_state = state.clone();
    let scanner_handle = tokio::spawn(async move {
        poller::run_scanner_loop(scanner, pairs, scanner_state, scan_interval).await;
    });

    info!("Press Ctrl+C to stop...");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
    }

    warn!("Shutdown signal received");
    state.stop();

    // Loops notice the flag after their current sleep; don't wait that long.
    let _ = tokio::time::timeout(Duration::from_secs(2), poller_handle).await;
    let _ = tokio::time::timeout(Duration::from_secs(1), scanner_handle).await;

    let summary = state.stats_summary();
    let chain = state.chain_status().await;
    info!("Final Stats:");
    info!("  Total uptime: {} seconds", summary.uptime_secs);
    info!("  Chain polls: {} ({} failed)", summary.polls, summary.poll_failures);
    info!("  Last height: {:?} ({})", chain.last_known_height, chain.state);
    info!("  Scans: {}", summary.scans);
    info!("  Price differences: {}", summary.differences_detected);

    info!("chainwatch stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), Level::DEBUG);
        assert_eq!(parse_level("error"), Level::ERROR);
        assert_eq!(parse_level("verbose"), Level::INFO);
    }

    #[test]
    fn test_args_override_config() {
        let args = Args::parse_from([
            "chainwatch",
            "--port",
            "8080",
            "--quorum",
            "2",
            "--primary-rpc",
            "https://rpc.primary.example",
            "--log-level",
            "debug",
        ]);
        let mut config = AppConfig::default();
        args.apply(&mut config);

        assert_eq!(config.http.port, 8080);
        assert_eq!(config.rpc.quorum, 2);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.rpc.primary.as_deref(), Some("https://rpc.primary.example"));

        // Environment fallback does not replace the CLI value.
        config.apply_primary(Some("https://env.example".to_string()));
        assert_eq!(config.rpc.primary.as_deref(), Some("https://rpc.primary.example"));
    }

    #[test]
    fn test_args_defaults_keep_config() {
        let args = Args::parse_from(["chainwatch"]);
        let mut config = AppConfig::default();
        args.apply(&mut config);

        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_config_log_level_kept_without_flag() {
        let mut config = AppConfig {
            log_level: "warn".to_string(),
            ..AppConfig::default()
        };
        Args::parse_from(["chainwatch"]).apply(&mut config);
        assert_eq!(config.log_level, "warn");

        Args::parse_from(["chainwatch", "-l", "trace"]).apply(&mut config);
        assert_eq!(config.log_level, "trace");
    }
}
