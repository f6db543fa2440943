//! RPC endpoint pool.
//!
//! An ordered list of dialable JSON-RPC endpoints. Position in the list is the
//! endpoint's priority: lower is tried first and wins ties.

use crate::error::{RpcError, RpcResult};
use serde::{Deserialize, Serialize};
use url::Url;

/// Public Ethereum mainnet endpoints used when none are configured.
pub const DEFAULT_ENDPOINTS: &[&str] = &[
    "https://ethereum.publicnode.com",
    "https://eth.drpc.org",
    "https://rpc.mevblocker.io",
    "https://eth-mainnet.public.blastapi.io",
    "https://gateway.tenderly.co/public/mainnet",
];

/// A single configured RPC endpoint. Immutable once the pool is built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// RPC URL
    pub url: String,
    /// Position in the pool (0 = preferred)
    pub priority: usize,
}

impl Endpoint {
    pub fn new(url: impl Into<String>, priority: usize) -> Self {
        Self {
            url: url.into(),
            priority,
        }
    }
}

/// Ordered, de-duplicated set of endpoints.
#[derive(Debug, Clone)]
pub struct EndpointPool {
    endpoints: Vec<Endpoint>,
}

impl EndpointPool {
    /// Build a pool from configured URLs, optionally placing a preferred
    /// endpoint at the head of the list.
    ///
    /// A primary URL already present in `urls` is moved to the head rather
    /// than duplicated. Blank entries are ignored.
    pub fn new<S: AsRef<str>>(urls: &[S], primary: Option<&str>) -> RpcResult<Self> {
        let mut ordered: Vec<String> = Vec::with_capacity(urls.len() + 1);

        if let Some(primary) = primary.map(str::trim).filter(|p| !p.is_empty()) {
            ordered.push(validate_url(primary)?);
        }

        for url in urls {
            let url = url.as_ref().trim();
            if url.is_empty() {
                continue;
            }
            let url = validate_url(url)?;
            if !ordered.contains(&url) {
                ordered.push(url);
            }
        }

        if ordered.is_empty() {
            return Err(RpcError::NoEndpoints);
        }

        let endpoints = ordered
            .into_iter()
            .enumerate()
            .map(|(priority, url)| Endpoint::new(url, priority))
            .collect();

        Ok(Self { endpoints })
    }

    /// Build a pool with no preferred endpoint.
    pub fn from_urls<S: AsRef<str>>(urls: &[S]) -> RpcResult<Self> {
        Self::new(urls, None)
    }

    /// Pool of the built-in public endpoints.
    pub fn default_endpoints(primary: Option<&str>) -> RpcResult<Self> {
        Self::new(DEFAULT_ENDPOINTS, primary)
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Endpoint at the given priority.
    pub fn get(&self, priority: usize) -> Option<&Endpoint> {
        self.endpoints.get(priority)
    }

    pub fn urls(&self) -> Vec<&str> {
        self.endpoints.iter().map(|e| e.url.as_str()).collect()
    }
}

fn validate_url(raw: &str) -> RpcResult<String> {
    let parsed = Url::parse(raw).map_err(|e| RpcError::InvalidEndpoint {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(raw.to_string()),
        other => Err(RpcError::InvalidEndpoint {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{}'", other),
        }),
    }
}
