//! Fallback connection manager.
//!
//! Presents one logical RPC connection backed by every endpoint in an
//! [`EndpointPool`]. Each request is issued to all endpoints concurrently; the
//! first value backed by `quorum` endpoints wins and the remaining in-flight
//! requests are dropped. Individual endpoint failures only cost that
//! endpoint's vote.
//!
//! The manager is owned by a single caller (the chain poller) and takes
//! `&mut self` for anything that can change its state. Retry cadence belongs
//! to that caller: after a failed `connect()` the manager stays
//! `Disconnected` until `connect()` is called again.

use crate::error::{summarize_failures, EndpointError, EndpointFailure, RpcError, RpcResult};
use crate::transport::{parse_quantity, RpcRequest, RpcTransport};
use crate::{Endpoint, EndpointPool};
use futures_util::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Aggregate connectivity of the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    /// Quorum reached with no dissenting endpoint.
    Connected,
    /// Quorum reached, but at least one endpoint answered with a different value.
    Degraded,
    /// Endpoints answered but no value reached quorum.
    Errored,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Degraded => "degraded",
            ConnectionState::Errored => "errored",
        }
    }

    /// Whether queries are accepted in this state.
    pub fn accepts_queries(self) -> bool {
        !matches!(self, ConnectionState::Disconnected | ConnectionState::Connecting)
    }

    /// Connected or degraded: the last operation met quorum.
    pub fn is_healthy(self) -> bool {
        matches!(self, ConnectionState::Connected | ConnectionState::Degraded)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot returned by [`FallbackConnectionManager::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub last_known_height: Option<u64>,
}

/// Configuration for the connection manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Endpoints that must answer (connect) or agree (query). At least 1.
    pub quorum: usize,
    /// Upper bound for a single endpoint's request.
    pub request_timeout: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            quorum: 1,
            request_timeout: Duration::from_secs(5),
        }
    }
}

impl ManagerConfig {
    pub fn with_quorum(mut self, quorum: usize) -> Self {
        self.quorum = quorum;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Successful result of a manager operation.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult<V> {
    pub value: V,
    /// Highest-priority endpoint among those that backed `value`.
    pub responding_endpoint: Endpoint,
    /// Number of endpoints that backed `value` when quorum was reached.
    pub agreeing: usize,
}

/// How responses count towards quorum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Agreement {
    /// Any successful response is a vote (liveness check).
    AnyResponse,
    /// Only responses with equal decoded values vote together.
    SameValue,
}

struct VoteGroup<'a, V> {
    value: V,
    leader: &'a Endpoint,
    votes: usize,
}

struct RaceOutcome<V> {
    winner: Option<QueryResult<V>>,
    responded: usize,
    best: usize,
    dissent: bool,
    failures: Vec<EndpointFailure>,
}

impl<V> RaceOutcome<V> {
    fn into_error(self, required: usize) -> RpcError {
        if self.responded == 0 {
            RpcError::AllEndpointsUnreachable {
                failures: self.failures,
            }
        } else {
            RpcError::QuorumNotReached {
                required,
                best: self.best,
                failures: self.failures,
            }
        }
    }
}

/// One logical RPC connection over many endpoints.
pub struct FallbackConnectionManager {
    pool: EndpointPool,
    transport: Arc<dyn RpcTransport>,
    config: ManagerConfig,
    state: ConnectionState,
    /// Last settled (non-`Connecting`) state that was logged.
    last_reported: Option<ConnectionState>,
    last_known_height: Option<u64>,
}

impl FallbackConnectionManager {
    /// Create a manager in the `Disconnected` state.
    ///
    /// Fails if the quorum is zero or larger than the pool.
    pub fn new(
        pool: EndpointPool,
        transport: Arc<dyn RpcTransport>,
        config: ManagerConfig,
    ) -> RpcResult<Self> {
        if pool.is_empty() {
            return Err(RpcError::NoEndpoints);
        }
        if config.quorum == 0 || config.quorum > pool.len() {
            return Err(RpcError::InvalidQuorum {
                quorum: config.quorum,
                endpoints: pool.len(),
            });
        }

        Ok(Self {
            pool,
            transport,
            config,
            state: ConnectionState::Disconnected,
            last_reported: None,
            last_known_height: None,
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn last_known_height(&self) -> Option<u64> {
        self.last_known_height
    }

    pub fn pool(&self) -> &EndpointPool {
        &self.pool
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Current state and last known height. Does not touch the network.
    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus {
            state: self.state,
            last_known_height: self.last_known_height,
        }
    }

    /// Ask every endpoint for its chain height.
    ///
    /// Succeeds when at least `quorum` endpoints answer, whatever heights they
    /// report; the reported height is the highest-priority answer. On failure
    /// the manager is left `Disconnected`.
    pub async fn connect(&mut self) -> RpcResult<QueryResult<u64>> {
        self.transition(ConnectionState::Connecting, None);

        let mut outcome = self
            .race(&RpcRequest::block_number(), parse_quantity, Agreement::AnyResponse)
            .await;

        match outcome.winner.take() {
            Some(result) => {
                self.last_known_height = Some(result.value);
                self.transition(ConnectionState::Connected, None);
                Ok(result)
            }
            None => {
                let err = outcome.into_error(self.config.quorum);
                self.transition(ConnectionState::Disconnected, Some(&err));
                Err(err)
            }
        }
    }

    /// Run a read-only request and accept the first decoded value that
    /// `quorum` endpoints agree on.
    ///
    /// Endpoints whose response cannot be decoded lose their vote, exactly
    /// like unreachable ones. Refused with [`RpcError::NotConnected`] while
    /// disconnected.
    pub async fn query<V, F>(&mut self, request: &RpcRequest, decode: F) -> RpcResult<QueryResult<V>>
    where
        V: PartialEq + Clone,
        F: Fn(&Value) -> Result<V, EndpointError>,
    {
        if !self.state.accepts_queries() {
            return Err(RpcError::NotConnected);
        }

        let mut outcome = self.race(request, decode, Agreement::SameValue).await;

        match outcome.winner.take() {
            Some(result) => {
                let next = if outcome.dissent {
                    ConnectionState::Degraded
                } else {
                    ConnectionState::Connected
                };
                self.transition(next, None);
                Ok(result)
            }
            None => {
                let next = if outcome.responded == 0 {
                    ConnectionState::Disconnected
                } else {
                    ConnectionState::Errored
                };
                let err = outcome.into_error(self.config.quorum);
                self.transition(next, Some(&err));
                Err(err)
            }
        }
    }

    /// Current chain height agreed on by `quorum` endpoints.
    pub async fn get_chain_height(&mut self) -> RpcResult<u64> {
        let result = self
            .query(&RpcRequest::block_number(), parse_quantity)
            .await?;
        self.last_known_height = Some(result.value);
        Ok(result.value)
    }

    /// Issue `request` to every endpoint and collect votes until one value
    /// reaches quorum or every endpoint has answered or failed.
    ///
    /// Returning drops the remaining futures, which cancels their requests.
    async fn race<V, F>(&self, request: &RpcRequest, decode: F, agreement: Agreement) -> RaceOutcome<V>
    where
        V: PartialEq + Clone,
        F: Fn(&Value) -> Result<V, EndpointError>,
    {
        let quorum = self.config.quorum;
        let timeout = self.config.request_timeout;
        let transport = &self.transport;

        let mut pending: FuturesUnordered<_> = self
            .pool
            .endpoints()
            .iter()
            .map(|endpoint| async move {
                let result = match tokio::time::timeout(timeout, transport.call(endpoint, request)).await {
                    Ok(result) => result,
                    Err(_) => Err(EndpointError::Timeout(timeout)),
                };
                (endpoint, result)
            })
            .collect();

        let mut groups: Vec<VoteGroup<'_, V>> = Vec::new();
        let mut failures = Vec::new();
        let mut responded = 0;
        let mut winner = None;

        while let Some((endpoint, result)) = pending.next().await {
            let value = match result.and_then(|raw| decode(&raw)) {
                Ok(value) => value,
                Err(error) => {
                    failures.push(EndpointFailure {
                        endpoint: endpoint.clone(),
                        error,
                    });
                    continue;
                }
            };
            responded += 1;

            let index = match groups
                .iter()
                .position(|g| agreement == Agreement::AnyResponse || g.value == value)
            {
                Some(index) => {
                    let group = &mut groups[index];
                    if endpoint.priority < group.leader.priority {
                        group.leader = endpoint;
                        if agreement == Agreement::AnyResponse {
                            // The reported value follows the preferred endpoint.
                            group.value = value;
                        }
                    }
                    index
                }
                None => {
                    groups.push(VoteGroup {
                        value,
                        leader: endpoint,
                        votes: 0,
                    });
                    groups.len() - 1
                }
            };

            let group = &mut groups[index];
            group.votes += 1;

            if group.votes >= quorum {
                winner = Some(QueryResult {
                    value: group.value.clone(),
                    responding_endpoint: group.leader.clone(),
                    agreeing: group.votes,
                });
                break;
            }
        }
        drop(pending);

        RaceOutcome {
            winner,
            responded,
            best: groups.iter().map(|g| g.votes).max().unwrap_or(0),
            dissent: groups.len() > 1,
            failures,
        }
    }

    fn transition(&mut self, next: ConnectionState, error: Option<&RpcError>) {
        let previous = self.state;
        self.state = next;

        if next == ConnectionState::Connecting {
            debug!(from = %previous, "RPC connection: contacting {} endpoints", self.pool.len());
            return;
        }

        // Repeated failures in the same settled state are not re-reported.
        if self.last_reported == Some(next) {
            return;
        }
        self.last_reported = Some(next);

        match (next, error) {
            (ConnectionState::Connected, _) => info!(
                from = %previous,
                to = %next,
                quorum = self.config.quorum,
                height = ?self.last_known_height,
                "RPC connection state changed"
            ),
            (_, Some(err)) => warn!(
                from = %previous,
                to = %next,
                quorum = self.config.quorum,
                error = %err,
                failures = %summarize_failures(err.failures()),
                "RPC connection state changed"
            ),
            (_, None) => warn!(
                from = %previous,
                to = %next,
                quorum = self.config.quorum,
                "RPC connection state changed"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Instant;

    #[derive(Debug, Clone)]
    enum Behavior {
        Height(u64),
        DelayedHeight(u64, Duration),
        Refuse,
        Hang,
        Garbage,
    }

    /// Transport whose per-URL behavior can be changed between calls.
    #[derive(Default)]
    struct ScriptedTransport {
        behaviors: Mutex<HashMap<String, Behavior>>,
        calls: AtomicUsize,
        cancelled: Arc<AtomicUsize>,
    }

    impl ScriptedTransport {
        fn set(&self, url: &str, behavior: Behavior) {
            self.behaviors.lock().unwrap().insert(url.to_string(), behavior);
        }

        fn set_all(&self, urls: &[String], behavior: Behavior) {
            for url in urls {
                self.set(url, behavior.clone());
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    struct CancelGuard(Arc<AtomicUsize>);

    impl Drop for CancelGuard {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn hex(height: u64) -> Value {
        json!(format!("{:#x}", height))
    }

    #[async_trait]
    impl RpcTransport for ScriptedTransport {
        async fn call(&self, endpoint: &Endpoint, _request: &RpcRequest) -> Result<Value, EndpointError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let behavior = self
                .behaviors
                .lock()
                .unwrap()
                .get(&endpoint.url)
                .cloned()
                .unwrap_or(Behavior::Refuse);

            match behavior {
                Behavior::Height(height) => Ok(hex(height)),
                Behavior::DelayedHeight(height, delay) => {
                    tokio::time::sleep(delay).await;
                    Ok(hex(height))
                }
                Behavior::Refuse => Err(EndpointError::Unreachable("connection refused".to_string())),
                Behavior::Hang => {
                    let _guard = CancelGuard(self.cancelled.clone());
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Err(EndpointError::Unreachable("hung".to_string()))
                }
                Behavior::Garbage => Ok(json!({ "unexpected": true })),
            }
        }
    }

    fn node_urls(count: usize) -> Vec<String> {
        (1..=count).map(|i| format!("http://node{}.test", i)).collect()
    }

    fn manager_with(
        transport: &Arc<ScriptedTransport>,
        urls: &[String],
        quorum: usize,
        timeout: Duration,
    ) -> FallbackConnectionManager {
        let pool = EndpointPool::from_urls(urls).unwrap();
        let config = ManagerConfig::default()
            .with_quorum(quorum)
            .with_request_timeout(timeout);
        FallbackConnectionManager::new(pool, transport.clone(), config).unwrap()
    }

    #[test]
    fn test_config_default() {
        let config = ManagerConfig::default();
        assert_eq!(config.quorum, 1);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_quorum_rejected() {
        let transport = Arc::new(ScriptedTransport::default());
        let urls = node_urls(5);

        for quorum in [0, 6] {
            let pool = EndpointPool::from_urls(&urls).unwrap();
            let config = ManagerConfig::default().with_quorum(quorum);
            assert!(matches!(
                FallbackConnectionManager::new(pool, transport.clone(), config),
                Err(RpcError::InvalidQuorum { endpoints: 5, .. })
            ));
        }
    }

    #[test]
    fn test_initial_status() {
        let transport = Arc::new(ScriptedTransport::default());
        let manager = manager_with(&transport, &node_urls(2), 1, Duration::from_secs(1));
        assert_eq!(
            manager.status(),
            ConnectionStatus {
                state: ConnectionState::Disconnected,
                last_known_height: None,
            }
        );
    }

    #[tokio::test]
    async fn test_connect_succeeds_with_quorum_reachable() {
        let transport = Arc::new(ScriptedTransport::default());
        let urls = node_urls(3);
        transport.set(&urls[0], Behavior::Height(10));
        transport.set(&urls[1], Behavior::Refuse);
        transport.set(&urls[2], Behavior::Height(10));

        let mut manager = manager_with(&transport, &urls, 2, Duration::from_secs(1));
        let result = manager.connect().await.unwrap();

        assert_eq!(result.value, 10);
        assert_eq!(result.agreeing, 2);
        assert_eq!(manager.state(), ConnectionState::Connected);
        assert_eq!(manager.last_known_height(), Some(10));
    }

    #[tokio::test]
    async fn test_connect_fails_below_quorum() {
        let transport = Arc::new(ScriptedTransport::default());
        let urls = node_urls(5);
        transport.set(&urls[2], Behavior::Height(77));

        let mut manager = manager_with(&transport, &urls, 2, Duration::from_secs(1));
        let err = manager.connect().await.unwrap_err();

        assert!(matches!(
            err,
            RpcError::QuorumNotReached {
                required: 2,
                best: 1,
                ..
            }
        ));
        assert_eq!(err.failures().len(), 4);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_connect_fails_when_nothing_answers() {
        let transport = Arc::new(ScriptedTransport::default());
        let urls = node_urls(3);

        let mut manager = manager_with(&transport, &urls, 1, Duration::from_secs(1));
        assert!(matches!(
            manager.connect().await,
            Err(RpcError::AllEndpointsUnreachable { .. })
        ));
        assert_eq!(manager.state(), ConnectionState::Disconnected);

        // Caller retries later once an endpoint comes back.
        transport.set(&urls[1], Behavior::Height(5));
        manager.connect().await.unwrap();
        assert_eq!(manager.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_last_endpoint_answers_after_four_refusals() {
        let transport = Arc::new(ScriptedTransport::default());
        let urls = node_urls(5);
        transport.set_all(&urls[..4], Behavior::Refuse);
        transport.set(&urls[4], Behavior::Height(100));

        let mut manager = manager_with(&transport, &urls, 1, Duration::from_secs(1));
        manager.connect().await.unwrap();

        let result = manager
            .query(&RpcRequest::block_number(), parse_quantity)
            .await
            .unwrap();
        assert_eq!(result.value, 100);
        assert_eq!(result.responding_endpoint, Endpoint::new(urls[4].clone(), 4));
        assert_eq!(manager.get_chain_height().await.unwrap(), 100);
        assert_eq!(manager.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_all_endpoints_timing_out() {
        let transport = Arc::new(ScriptedTransport::default());
        let urls = node_urls(5);
        transport.set_all(&urls, Behavior::Height(1));

        let timeout = Duration::from_millis(100);
        let mut manager = manager_with(&transport, &urls, 1, timeout);
        manager.connect().await.unwrap();

        transport.set_all(&urls, Behavior::Hang);
        let started = Instant::now();
        let err = manager.get_chain_height().await.unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(2));
        match &err {
            RpcError::AllEndpointsUnreachable { failures } => {
                assert_eq!(failures.len(), 5);
                assert!(failures
                    .iter()
                    .all(|f| f.error == EndpointError::Timeout(timeout)));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        // Height from the last successful connect is kept.
        assert_eq!(manager.last_known_height(), Some(1));
    }

    #[tokio::test]
    async fn test_quorum_two_with_single_reachable_endpoint() {
        let transport = Arc::new(ScriptedTransport::default());
        let urls = node_urls(3);
        transport.set(&urls[0], Behavior::Height(42));

        let mut manager = manager_with(&transport, &urls, 2, Duration::from_secs(1));
        assert!(manager.connect().await.is_err());
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(manager.last_known_height(), None);
    }

    #[tokio::test]
    async fn test_query_refused_while_disconnected() {
        let transport = Arc::new(ScriptedTransport::default());
        let urls = node_urls(2);
        transport.set_all(&urls, Behavior::Height(3));

        let mut manager = manager_with(&transport, &urls, 1, Duration::from_secs(1));
        assert!(matches!(
            manager.get_chain_height().await,
            Err(RpcError::NotConnected)
        ));
        assert_eq!(transport.calls(), 0);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_status_is_idempotent() {
        let transport = Arc::new(ScriptedTransport::default());
        let urls = node_urls(2);
        transport.set_all(&urls, Behavior::Height(9));

        let mut manager = manager_with(&transport, &urls, 1, Duration::from_secs(1));
        manager.connect().await.unwrap();
        let calls = transport.calls();

        let first = manager.status();
        let second = manager.status();
        assert_eq!(first, second);
        assert_eq!(first.last_known_height, Some(9));
        assert_eq!(transport.calls(), calls);
    }

    #[tokio::test]
    async fn test_single_failure_is_isolated() {
        let transport = Arc::new(ScriptedTransport::default());
        let urls = node_urls(3);
        transport.set(&urls[0], Behavior::Refuse);
        transport.set(&urls[1], Behavior::Height(50));
        transport.set(&urls[2], Behavior::Height(50));

        let mut manager = manager_with(&transport, &urls, 2, Duration::from_secs(1));
        manager.connect().await.unwrap();
        assert_eq!(manager.get_chain_height().await.unwrap(), 50);
        assert_eq!(manager.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_malformed_response_loses_vote() {
        let transport = Arc::new(ScriptedTransport::default());
        let urls = node_urls(2);
        transport.set(&urls[0], Behavior::Garbage);
        transport.set(&urls[1], Behavior::Height(8));

        let mut manager = manager_with(&transport, &urls, 1, Duration::from_secs(1));
        manager.connect().await.unwrap();
        assert_eq!(manager.get_chain_height().await.unwrap(), 8);

        transport.set(&urls[1], Behavior::Garbage);
        let err = manager.get_chain_height().await.unwrap_err();
        assert!(err
            .failures()
            .iter()
            .all(|f| matches!(f.error, EndpointError::MalformedResponse(_))));
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_hanging_endpoint_is_cancelled_once_quorum_reached() {
        let transport = Arc::new(ScriptedTransport::default());
        let urls = node_urls(2);
        transport.set(&urls[0], Behavior::Hang);
        transport.set(&urls[1], Behavior::DelayedHeight(7, Duration::from_millis(20)));

        let mut manager = manager_with(&transport, &urls, 1, Duration::from_secs(30));
        let started = Instant::now();
        let result = manager.connect().await.unwrap();

        assert_eq!(result.value, 7);
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(transport.cancelled.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_disagreement_without_quorum_is_errored() {
        let transport = Arc::new(ScriptedTransport::default());
        let urls = node_urls(3);
        transport.set(&urls[0], Behavior::Height(100));
        transport.set(&urls[1], Behavior::Height(101));
        transport.set(&urls[2], Behavior::Height(102));

        let mut manager = manager_with(&transport, &urls, 2, Duration::from_secs(1));
        // Liveness only needs answers, not agreement.
        manager.connect().await.unwrap();

        let err = manager.get_chain_height().await.unwrap_err();
        assert!(matches!(
            err,
            RpcError::QuorumNotReached {
                required: 2,
                best: 1,
                ..
            }
        ));
        assert_eq!(manager.state(), ConnectionState::Errored);

        transport.set_all(&urls, Behavior::Height(103));
        assert_eq!(manager.get_chain_height().await.unwrap(), 103);
        assert_eq!(manager.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_dissenting_endpoint_degrades() {
        let transport = Arc::new(ScriptedTransport::default());
        let urls = node_urls(3);
        let delay = Duration::from_millis(30);
        transport.set(&urls[0], Behavior::DelayedHeight(100, delay));
        transport.set(&urls[1], Behavior::DelayedHeight(100, delay));
        transport.set(&urls[2], Behavior::Height(99));

        let mut manager = manager_with(&transport, &urls, 2, Duration::from_secs(1));
        manager.connect().await.unwrap();

        let result = manager
            .query(&RpcRequest::block_number(), parse_quantity)
            .await
            .unwrap();
        assert_eq!(result.value, 100);
        assert_eq!(result.agreeing, 2);
        assert_eq!(result.responding_endpoint.priority, 0);
        assert_eq!(manager.state(), ConnectionState::Degraded);
    }

    #[tokio::test]
    async fn test_connect_reports_highest_priority_answer() {
        let transport = Arc::new(ScriptedTransport::default());
        let urls = node_urls(3);
        transport.set(&urls[0], Behavior::Height(10));
        transport.set(&urls[1], Behavior::Height(11));
        transport.set(&urls[2], Behavior::Height(12));

        let mut manager = manager_with(&transport, &urls, 3, Duration::from_secs(1));
        let result = manager.connect().await.unwrap();

        assert_eq!(result.value, 10);
        assert_eq!(result.responding_endpoint.priority, 0);
        assert_eq!(result.agreeing, 3);
    }

    /// Records the level of every event it sees.
    #[derive(Clone, Default)]
    struct LevelRecorder(Arc<Mutex<Vec<tracing::Level>>>);

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for LevelRecorder {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
            self.0.lock().unwrap().push(*event.metadata().level());
        }
    }

    impl LevelRecorder {
        /// Events above debug, draining the buffer.
        fn take_settled(&self) -> Vec<tracing::Level> {
            self.0
                .lock()
                .unwrap()
                .drain(..)
                .filter(|level| *level != tracing::Level::DEBUG)
                .collect()
        }
    }

    #[tokio::test]
    async fn test_repeated_failures_logged_once() {
        use tracing_subscriber::layer::SubscriberExt;

        let recorder = LevelRecorder::default();
        let subscriber = tracing_subscriber::registry().with(recorder.clone());
        let _guard = tracing::subscriber::set_default(subscriber);

        let transport = Arc::new(ScriptedTransport::default());
        let urls = node_urls(5);
        transport.set_all(&urls, Behavior::Refuse);
        let mut manager = manager_with(&transport, &urls, 1, Duration::from_secs(1));

        for _ in 0..10 {
            assert!(manager.connect().await.is_err());
        }
        assert_eq!(recorder.take_settled(), vec![tracing::Level::WARN]);

        transport.set(&urls[3], Behavior::Height(12));
        manager.connect().await.unwrap();
        assert_eq!(manager.get_chain_height().await.unwrap(), 12);
        assert_eq!(manager.get_chain_height().await.unwrap(), 12);
        assert_eq!(recorder.take_settled(), vec![tracing::Level::INFO]);
    }

    #[tokio::test]
    async fn test_generic_query_with_custom_decoder() {
        let transport = Arc::new(ScriptedTransport::default());
        let urls = node_urls(2);
        transport.set_all(&urls, Behavior::Height(1));

        let mut manager = manager_with(&transport, &urls, 2, Duration::from_secs(1));
        manager.connect().await.unwrap();

        let result = manager
            .query(&RpcRequest::chain_id(), |raw| {
                raw.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| EndpointError::MalformedResponse("not a string".to_string()))
            })
            .await
            .unwrap();
        assert_eq!(result.value, "0x1");
    }
}
