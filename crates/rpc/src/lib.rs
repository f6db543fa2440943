//! Multi-endpoint JSON-RPC access with quorum-based fallback.
//!
//! ## Architecture
//!
//! - `endpoint` - Ordered, validated pool of RPC endpoints
//! - `transport` - JSON-RPC request/response handling (`RpcTransport`, `HttpTransport`)
//! - `manager` - `FallbackConnectionManager`: races endpoints, applies the quorum policy,
//!   tracks connection state

pub mod endpoint;
pub mod error;
pub mod manager;
pub mod transport;

pub use endpoint::*;
pub use error::*;
pub use manager::*;
pub use transport::*;
