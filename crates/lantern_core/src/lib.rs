//! Lantern core: chain metadata, RPC endpoint configuration, and logging
//! setup shared by the wallet crates.

pub mod chain;
pub mod logging;
pub mod rpc;

// Re-export primary types for convenient access.
pub use chain::{Chain, ChainIdError};
pub use rpc::{RpcConfig, RpcConfigStore, validate_url};
