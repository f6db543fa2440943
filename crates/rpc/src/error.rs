//! Error types for RPC operations.

use crate::Endpoint;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single endpoint for a single request.
///
/// These never leave the connection manager on their own; they are collected
/// into the detail of a manager-level [`RpcError`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointError {
    #[error("endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP status {0}")]
    Http(u16),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
}

impl From<reqwest::Error> for EndpointError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            EndpointError::MalformedResponse(err.to_string())
        } else {
            EndpointError::Unreachable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for EndpointError {
    fn from(err: serde_json::Error) -> Self {
        EndpointError::MalformedResponse(err.to_string())
    }
}

/// One endpoint's failure, recorded while the manager moves on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointFailure {
    pub endpoint: Endpoint,
    pub error: EndpointError,
}

impl fmt::Display for EndpointFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}: {}", self.endpoint.priority, self.endpoint.url, self.error)
    }
}

/// Compact, single-line rendering of a failure list for log events.
pub fn summarize_failures(failures: &[EndpointFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors surfaced by the endpoint pool and the connection manager.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("all {} endpoints unreachable", .failures.len())]
    AllEndpointsUnreachable { failures: Vec<EndpointFailure> },

    #[error("quorum not reached: best vote {best} of required {required} (answered or agreed)")]
    QuorumNotReached {
        required: usize,
        best: usize,
        failures: Vec<EndpointFailure>,
    },

    #[error("not connected")]
    NotConnected,

    #[error("no RPC endpoints configured")]
    NoEndpoints,

    #[error("invalid endpoint URL '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },

    #[error("invalid quorum {quorum} for {endpoints} endpoints")]
    InvalidQuorum { quorum: usize, endpoints: usize },

    #[error("HTTP client error: {0}")]
    Client(String),
}

impl RpcError {
    /// Returns true if the next polling cycle may succeed without any
    /// configuration change.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RpcError::AllEndpointsUnreachable { .. }
                | RpcError::QuorumNotReached { .. }
                | RpcError::NotConnected
        )
    }

    /// Per-endpoint failure detail, if this error carries any.
    pub fn failures(&self) -> &[EndpointFailure] {
        match self {
            RpcError::AllEndpointsUnreachable { failures }
            | RpcError::QuorumNotReached { failures, .. } => failures,
            _ => &[],
        }
    }
}

/// Result type for RPC operations.
pub type RpcResult<T> = Result<T, RpcError>;
