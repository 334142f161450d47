//! Chain gateway: the wallet's view of a NEAR JSON-RPC node.
//!
//! [`ChainGateway`] is the capability trait the rest of the crate consumes;
//! [`JsonRpcGateway`] implements it over HTTP. Reads (`view_block`,
//! `view_access_key`) are idempotent and retried at most once with a short
//! backoff; `submit` is never retried, since a duplicate broadcast risks
//! double execution.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::action::dec_u128_opt;
use crate::wire::{self, PublicKey, SignedTransaction};

const RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// Errors from the chain gateway.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    /// The call exceeded the configured timeout.
    #[error("gateway call timed out")]
    Timeout,

    /// Network-level failure (connect, TLS, malformed response).
    #[error("transport error: {0}")]
    Transport(String),

    /// The node answered with an RPC-level error.
    #[error("rpc error: {0}")]
    Rpc(String),

    /// The queried access key does not exist on-chain. Surfaced separately
    /// because the resolver treats it as "skip this candidate", not a failure.
    #[error("access key {public_key} does not exist for {account_id}")]
    UnknownAccessKey {
        account_id: String,
        public_key: String,
    },
}

/// Read consistency level for block and access-key queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Finality {
    /// Irreversible.
    Final,
    /// Latest block, may still be reorganized.
    Optimistic,
}

/// The slice of a block the signing path needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockView {
    pub hash: [u8; 32],
    pub height: u64,
}

/// An access key as reported by the chain: permission plus current nonce.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessKeyView {
    pub nonce: u64,
    pub permission: AccessKeyPermissionView,
}

/// Permission in NEAR's JSON representation: the string `"FullAccess"` or
/// `{"FunctionCall": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AccessKeyPermissionView {
    FullAccess,
    FunctionCall(FunctionCallPermissionView),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCallPermissionView {
    #[serde(default, with = "dec_u128_opt")]
    pub allowance: Option<u128>,
    pub receiver_id: String,
    pub method_names: Vec<String>,
}

impl AccessKeyView {
    pub fn is_full_access(&self) -> bool {
        matches!(self.permission, AccessKeyPermissionView::FullAccess)
    }
}

/// Final execution outcome of a submitted transaction. Kept as raw JSON to
/// avoid coupling to the node's full schema; the wallet only inspects status.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionOutcome(pub Value);

impl ExecutionOutcome {
    /// The transaction hash reported by the node, if present.
    pub fn transaction_hash(&self) -> Option<&str> {
        self.0
            .get("transaction")
            .and_then(|tx| tx.get("hash"))
            .and_then(Value::as_str)
    }

    /// Whether the final status reports success.
    pub fn is_success(&self) -> bool {
        self.0
            .get("status")
            .map(|s| s.get("SuccessValue").is_some() || s.get("SuccessReceiptId").is_some())
            .unwrap_or(false)
    }
}

/// Remote procedure interface to a NEAR node.
#[async_trait]
pub trait ChainGateway: Send + Sync {
    /// Fetch the latest block at the given finality.
    async fn view_block(&self, finality: Finality) -> Result<BlockView, GatewayError>;

    /// Fetch the on-chain view (permission + nonce) of an access key.
    async fn view_access_key(
        &self,
        account_id: &str,
        public_key: &PublicKey,
    ) -> Result<AccessKeyView, GatewayError>;

    /// Broadcast a signed transaction and wait for its final outcome.
    async fn submit(&self, tx: &SignedTransaction) -> Result<ExecutionOutcome, GatewayError>;
}

/// `ChainGateway` over NEAR JSON-RPC 2.0.
pub struct JsonRpcGateway {
    url: String,
    client: Client,
    next_id: AtomicU64,
}

impl JsonRpcGateway {
    /// Create a gateway for the given endpoint with a bounded per-call timeout.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Ok(Self {
            url: url.into(),
            client,
            next_id: AtomicU64::new(1),
        })
    }

    /// The configured endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, GatewayError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!(url = %self.url, method = %method, id, "rpc call");

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let payload: Value = response.json().await.map_err(map_reqwest_error)?;

        if let Some(error) = payload.get("error") {
            return Err(parse_rpc_error(error));
        }

        payload
            .get("result")
            .cloned()
            .ok_or_else(|| GatewayError::Transport("response missing result".into()))
    }

    /// Idempotent read with a single retry on transport-level failure.
    async fn call_read(&self, method: &str, params: Value) -> Result<Value, GatewayError> {
        match self.call(method, params.clone()).await {
            Ok(result) => Ok(result),
            // RPC-level errors are answers, not outages; retrying won't help.
            Err(err @ (GatewayError::Rpc(_) | GatewayError::UnknownAccessKey { .. })) => Err(err),
            Err(first) => {
                warn!(method = %method, error = %first, "read failed, retrying once");
                tokio::time::sleep(RETRY_BACKOFF).await;
                self.call(method, params).await
            }
        }
    }
}

fn map_reqwest_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Transport(err.to_string())
    }
}

fn parse_rpc_error(error: &Value) -> GatewayError {
    let cause_name = error
        .get("cause")
        .and_then(|c| c.get("name"))
        .and_then(Value::as_str)
        .unwrap_or_default();

    if cause_name == "UNKNOWN_ACCESS_KEY" {
        let info = error.get("cause").and_then(|c| c.get("info"));
        return GatewayError::UnknownAccessKey {
            account_id: info
                .and_then(|i| i.get("account_id"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            public_key: info
                .and_then(|i| i.get("public_key"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        };
    }

    let message = error
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unknown rpc error");
    GatewayError::Rpc(format!("{message} ({cause_name})"))
}

#[async_trait]
impl ChainGateway for JsonRpcGateway {
    async fn view_block(&self, finality: Finality) -> Result<BlockView, GatewayError> {
        let result = self
            .call_read("block", json!({ "finality": finality }))
            .await?;

        let header = result
            .get("header")
            .ok_or_else(|| GatewayError::Transport("block response missing header".into()))?;
        let hash_str = header
            .get("hash")
            .and_then(Value::as_str)
            .ok_or_else(|| GatewayError::Transport("block header missing hash".into()))?;
        let hash = wire::decode_block_hash(hash_str)
            .ok_or_else(|| GatewayError::Transport(format!("malformed block hash: {hash_str}")))?;
        let height = header
            .get("height")
            .and_then(Value::as_u64)
            .unwrap_or_default();

        Ok(BlockView { hash, height })
    }

    async fn view_access_key(
        &self,
        account_id: &str,
        public_key: &PublicKey,
    ) -> Result<AccessKeyView, GatewayError> {
        let result = self
            .call_read(
                "query",
                json!({
                    "request_type": "view_access_key",
                    "finality": "final",
                    "account_id": account_id,
                    "public_key": public_key.to_near_string(),
                }),
            )
            .await?;

        // Some node versions report a missing key inside a 200 result.
        if let Some(error) = result.get("error").and_then(Value::as_str) {
            if error.contains("does not exist") {
                return Err(GatewayError::UnknownAccessKey {
                    account_id: account_id.to_string(),
                    public_key: public_key.to_near_string(),
                });
            }
            return Err(GatewayError::Rpc(error.to_string()));
        }

        serde_json::from_value(result).map_err(|e| GatewayError::Transport(e.to_string()))
    }

    async fn submit(&self, tx: &SignedTransaction) -> Result<ExecutionOutcome, GatewayError> {
        let encoded = tx
            .to_base64()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        // No retry here: re-broadcasting on an ambiguous failure risks
        // duplicate execution.
        let result = self.call("broadcast_tx_commit", json!([encoded])).await?;
        Ok(ExecutionOutcome(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_view_parses_full_access_literal() {
        let view: AccessKeyView =
            serde_json::from_value(json!({"nonce": 7, "permission": "FullAccess"})).unwrap();
        assert!(view.is_full_access());
        assert_eq!(view.nonce, 7);
    }

    #[test]
    fn permission_view_parses_function_call() {
        let view: AccessKeyView = serde_json::from_value(json!({
            "nonce": 12,
            "permission": {
                "FunctionCall": {
                    "allowance": "250000000000000000000000",
                    "receiver_id": "contract.testnet",
                    "method_names": ["ping"]
                }
            }
        }))
        .unwrap();

        assert!(!view.is_full_access());
        match &view.permission {
            AccessKeyPermissionView::FunctionCall(fc) => {
                assert_eq!(fc.receiver_id, "contract.testnet");
                assert_eq!(fc.allowance, Some(250_000_000_000_000_000_000_000));
            }
            other => panic!("unexpected permission: {other:?}"),
        }
    }

    #[test]
    fn permission_view_null_allowance() {
        let view: AccessKeyView = serde_json::from_value(json!({
            "nonce": 0,
            "permission": {
                "FunctionCall": {
                    "allowance": null,
                    "receiver_id": "contract.testnet",
                    "method_names": []
                }
            }
        }))
        .unwrap();
        match &view.permission {
            AccessKeyPermissionView::FunctionCall(fc) => assert_eq!(fc.allowance, None),
            other => panic!("unexpected permission: {other:?}"),
        }
    }

    #[test]
    fn rpc_error_with_unknown_access_key_cause() {
        let err = parse_rpc_error(&json!({
            "name": "HANDLER_ERROR",
            "cause": {
                "name": "UNKNOWN_ACCESS_KEY",
                "info": {
                    "account_id": "alice.testnet",
                    "public_key": "ed25519:abc"
                }
            },
            "message": "access key not found"
        }));
        match err {
            GatewayError::UnknownAccessKey {
                account_id,
                public_key,
            } => {
                assert_eq!(account_id, "alice.testnet");
                assert_eq!(public_key, "ed25519:abc");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rpc_error_generic() {
        let err = parse_rpc_error(&json!({
            "name": "REQUEST_VALIDATION_ERROR",
            "cause": {"name": "PARSE_ERROR"},
            "message": "bad request"
        }));
        match err {
            GatewayError::Rpc(msg) => {
                assert!(msg.contains("bad request"));
                assert!(msg.contains("PARSE_ERROR"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn execution_outcome_success_detection() {
        let ok = ExecutionOutcome(json!({
            "status": {"SuccessValue": ""},
            "transaction": {"hash": "9fDeadBeef"}
        }));
        assert!(ok.is_success());
        assert_eq!(ok.transaction_hash(), Some("9fDeadBeef"));

        let failed = ExecutionOutcome(json!({
            "status": {"Failure": {"error_message": "nope"}}
        }));
        assert!(!failed.is_success());
        assert_eq!(failed.transaction_hash(), None);
    }

    #[test]
    fn finality_serializes_lowercase() {
        assert_eq!(serde_json::to_value(Finality::Final).unwrap(), "final");
        assert_eq!(
            serde_json::to_value(Finality::Optimistic).unwrap(),
            "optimistic"
        );
    }
}
