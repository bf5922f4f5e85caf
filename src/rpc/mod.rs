//! JSON-RPC façade over the wallet engine.

/// Method dispatch and per-call wallet reconstruction
pub mod server;
pub mod types;

pub use server::WalletRpcService;
pub use types::{JsonRpcRequest, JsonRpcResponse, RpcError};
