//! JSON-RPC 2.0 transport.
//!
//! [`RpcTransport`] is the seam between the connection manager and the
//! network: the manager only ever asks "send this request to that endpoint".

use crate::error::{EndpointError, RpcError, RpcResult};
use crate::Endpoint;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// A read-only JSON-RPC call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcRequest {
    pub method: String,
    pub params: Value,
}

impl RpcRequest {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }

    /// `eth_blockNumber`: current chain height.
    pub fn block_number() -> Self {
        Self::new("eth_blockNumber", json!([]))
    }

    /// `eth_chainId`.
    pub fn chain_id() -> Self {
        Self::new("eth_chainId", json!([]))
    }
}

/// Sends one request to one endpoint.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// Returns the `result` member of the response.
    async fn call(&self, endpoint: &Endpoint, request: &RpcRequest) -> Result<Value, EndpointError>;
}

/// JSON-RPC over HTTP(S) POST.
#[derive(Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl HttpTransport {
    /// Default connect timeout. Overall request time is bounded by the
    /// manager's per-endpoint timeout.
    const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

    pub fn new() -> RpcResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Self::CONNECT_TIMEOUT)
            .build()
            .map_err(|e| RpcError::Client(e.to_string()))?;

        Ok(Self::with_client(client))
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            next_id: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn call(&self, endpoint: &Endpoint, request: &RpcRequest) -> Result<Value, EndpointError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": request.method,
            "params": request.params,
        });

        let response = self.client.post(&endpoint.url).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(EndpointError::Http(status.as_u16()));
        }

        let bytes = response.bytes().await?;
        decode_response(&bytes)
    }
}

/// Extract `result` from a JSON-RPC response body.
///
/// A present `error` member wins over `result`. A `null` result is valid.
pub fn decode_response(body: &[u8]) -> Result<Value, EndpointError> {
    let envelope: Value = serde_json::from_slice(body)?;
    let object = envelope
        .as_object()
        .ok_or_else(|| EndpointError::MalformedResponse("response is not an object".to_string()))?;

    if let Some(version) = object.get("jsonrpc").filter(|v| v.as_str() != Some("2.0")) {
        return Err(EndpointError::MalformedResponse(format!("unsupported jsonrpc version {}", version)));
    }

    if let Some(error) = object.get("error").filter(|e| !e.is_null()) {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or_default();
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        return Err(EndpointError::Rpc { code, message });
    }

    object
        .get("result")
        .cloned()
        .ok_or_else(|| EndpointError::MalformedResponse("missing result".to_string()))
}

/// Decode a hex quantity such as `"0x10d4f"`.
pub fn parse_quantity(value: &Value) -> Result<u64, EndpointError> {
    let raw = value
        .as_str()
        .ok_or_else(|| EndpointError::MalformedResponse(format!("expected hex string, got {}", value)))?;

    let digits = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .ok_or_else(|| EndpointError::MalformedResponse(format!("missing 0x prefix: {}", raw)))?;

    if digits.is_empty() {
        return Err(EndpointError::MalformedResponse("empty quantity".to_string()));
    }

    u64::from_str_radix(digits, 16)
        .map_err(|e| EndpointError::MalformedResponse(format!("bad quantity {}: {}", raw, e)))
}
