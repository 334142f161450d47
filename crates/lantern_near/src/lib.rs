//! Lantern NEAR: transaction signing and access-key authorization for a
//! session-based wallet.
//!
//! This crate is the decision core of the wallet: given a session-scoped
//! signing request, it determines which key may authorize the transaction,
//! builds and signs it against fresh chain state, and submits it.
//!
//! # Architecture
//!
//! - **Gateway**: [`ChainGateway`] abstracts the NEAR JSON-RPC node
//!   (block queries, access-key views, transaction submission).
//! - **Key storage**: [`KeyStore`] is a pluggable capability; the wallet
//!   holds one store as the persistent vault and one for session-scoped
//!   function-call keys.
//! - **Authorization**: [`access`] validates a candidate key's permission
//!   against a transaction and resolves the signing key per request, scoped
//!   keys before full-access keys.
//! - **Orchestration**: [`NearWallet`] is an explicit context object owned by
//!   the embedding application's session lifecycle.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use lantern_core::rpc::RpcConfigStore;
//! use lantern_near::{InMemoryKeyStore, InMemorySessionStore, NearWallet};
//!
//! let wallet = NearWallet::from_rpc_config(
//!     &RpcConfigStore::with_defaults(),
//!     Arc::new(InMemoryKeyStore::new()),
//!     Arc::new(InMemoryKeyStore::new()),
//!     Arc::new(InMemorySessionStore::new()),
//! ).unwrap();
//! # let _ = wallet;
//! ```

pub mod access;
pub mod action;
pub mod error;
pub mod gateway;
pub mod handler;
pub mod key;
pub mod keystore;
pub mod session;
pub mod wallet;
pub mod wire;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use access::{BatchAccess, KeySource, ResolvedAccess, validate_access_key};
pub use action::{ActionDescriptor, PermissionDescriptor, TransactionRequest, translate_actions};
pub use error::WalletError;
pub use gateway::{
    AccessKeyPermissionView, AccessKeyView, BlockView, ChainGateway, ExecutionOutcome, Finality,
    GatewayError, JsonRpcGateway,
};
pub use handler::{RpcResponse, SessionRequest, approve_near_request, reject_near_request};
pub use key::KeyPair;
pub use keystore::{FileKeyStore, InMemoryKeyStore, KeyStore};
pub use session::{AccountRef, InMemorySessionStore, SessionStore};
pub use wallet::{Account, BatchPolicy, NearWallet, SignOutOutcome};
