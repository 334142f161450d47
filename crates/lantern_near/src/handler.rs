//! Session request dispatch: the JSON-RPC-style surface the surrounding
//! WalletConnect plumbing calls into.
//!
//! Every response is either a `result` or an `error` carrying a stable
//! machine-readable reason code plus free-text detail; rendering is the
//! caller's concern. Malformed `params` payloads are rejected as
//! `INVALID_ACTION` at this boundary, before any network call.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::action::TransactionRequest;
use crate::error::WalletError;
use crate::wallet::{BatchPolicy, NearWallet};

/// NEAR signing methods handled by this wallet.
pub const NEAR_SIGNING_METHODS: [&str; 7] = [
    "near_getAccounts",
    "near_signIn",
    "near_signOut",
    "near_signTransaction",
    "near_signTransactions",
    "near_signAndSendTransaction",
    "near_signAndSendTransactions",
];

/// An incoming session request event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub id: u64,
    pub topic: String,
    pub chain_id: Option<String>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// A JSON-RPC-style response: exactly one of `result` or `error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub id: u64,
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    /// Stable reason code, e.g. `NO_AUTHORIZED_KEY`.
    pub reason: String,
    pub message: String,
}

impl RpcResponse {
    fn result(id: u64, result: Value) -> Self {
        Self {
            id,
            jsonrpc: "2.0".into(),
            result: Some(result),
            error: None,
        }
    }

    fn error(id: u64, code: i64, reason: &str, message: String) -> Self {
        Self {
            id,
            jsonrpc: "2.0".into(),
            result: None,
            error: Some(RpcError {
                code,
                reason: reason.into(),
                message,
            }),
        }
    }
}

/// EIP-1193-style numeric code for a wallet error.
fn rpc_code(err: &WalletError) -> i64 {
    match err {
        WalletError::InvalidChainId(_)
        | WalletError::UnknownSession(_)
        | WalletError::InvalidAction(_) => -32602,
        WalletError::UnauthorizedSigner(_) | WalletError::NoAuthorizedKey(_) => 4100,
        WalletError::GatewayTimeout
        | WalletError::Gateway(_)
        | WalletError::Keystore(_)
        | WalletError::Serialization(_) => -32000,
    }
}

fn rejection(id: u64, err: WalletError) -> RpcResponse {
    RpcResponse::error(id, rpc_code(&err), err.reason_code(), err.to_string())
}

/// Build the standard response for a request the user declined.
pub fn reject_near_request(request: &SessionRequest) -> RpcResponse {
    RpcResponse::error(
        request.id,
        4001,
        "USER_REJECTED",
        "Request rejected by user".into(),
    )
}

/// Dispatch an approved session request to the wallet.
pub async fn approve_near_request(wallet: &NearWallet, request: &SessionRequest) -> RpcResponse {
    debug!(method = %request.method, id = request.id, topic = %request.topic, "approving request");

    match handle(wallet, request).await {
        Ok(result) => RpcResponse::result(request.id, result),
        Err(err) => rejection(request.id, err),
    }
}

async fn handle(wallet: &NearWallet, request: &SessionRequest) -> Result<Value, WalletError> {
    // Every method needs a chain id; reject before touching the network.
    let chain_id = request
        .chain_id
        .as_deref()
        .ok_or_else(|| WalletError::InvalidChainId("<missing>".into()))?;
    let topic = request.topic.as_str();

    match request.method.as_str() {
        "near_getAccounts" => {
            let accounts = wallet.get_accounts(chain_id)?;
            Ok(serde_json::to_value(accounts)?)
        }
        "near_signIn" => {
            let params: SignInParams = parse_params(&request.params)?;
            let accounts = wallet
                .sign_in(chain_id, topic, &params.contract_id, &params.method_names)
                .await?;
            Ok(serde_json::to_value(accounts)?)
        }
        "near_signOut" => {
            let outcome = wallet.sign_out(chain_id, topic).await?;
            Ok(serde_json::to_value(outcome)?)
        }
        "near_signTransaction" => {
            let params: SignTransactionParams = parse_params(&request.params)?;
            let signed = wallet
                .sign_transactions(chain_id, topic, std::slice::from_ref(&params.transaction))
                .await?;
            let encoded = signed[0].to_base64()?;
            Ok(Value::String(encoded))
        }
        "near_signTransactions" => {
            let params: SignTransactionsParams = parse_params(&request.params)?;
            let signed = wallet
                .sign_transactions(chain_id, topic, &params.transactions)
                .await?;
            let encoded = signed
                .iter()
                .map(|tx| tx.to_base64())
                .collect::<Result<Vec<_>, _>>()?;
            Ok(json!(encoded))
        }
        "near_signAndSendTransaction" => {
            let params: SignTransactionParams = parse_params(&request.params)?;
            let outcome = wallet
                .sign_and_send_transaction(chain_id, topic, &params.transaction)
                .await?;
            Ok(outcome.0)
        }
        "near_signAndSendTransactions" => {
            let params: SignTransactionsParams = parse_params(&request.params)?;
            let outcomes = wallet
                .sign_and_send_transactions(
                    chain_id,
                    topic,
                    &params.transactions,
                    BatchPolicy::FailFast,
                )
                .await?;
            Ok(json!(outcomes))
        }
        other => Err(WalletError::InvalidAction(format!(
            "unknown JSON-RPC method: {other}"
        ))),
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(params: &Value) -> Result<T, WalletError> {
    serde_json::from_value(params.clone()).map_err(|e| WalletError::InvalidAction(e.to_string()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInParams {
    contract_id: String,
    #[serde(default)]
    method_names: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SignTransactionParams {
    transaction: TransactionRequest,
}

#[derive(Debug, Deserialize)]
struct SignTransactionsParams {
    transactions: Vec<TransactionRequest>,
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::keystore::InMemoryKeyStore;
    use crate::session::InMemorySessionStore;

    fn empty_wallet() -> NearWallet {
        NearWallet::new(
            HashMap::new(),
            Arc::new(InMemoryKeyStore::new()),
            Arc::new(InMemoryKeyStore::new()),
            Arc::new(InMemorySessionStore::new()),
        )
    }

    fn request(method: &str, chain_id: Option<&str>, params: Value) -> SessionRequest {
        SessionRequest {
            id: 1,
            topic: "topic1".into(),
            chain_id: chain_id.map(Into::into),
            method: method.into(),
            params,
        }
    }

    #[tokio::test]
    async fn missing_chain_id_is_rejected() {
        let wallet = empty_wallet();
        let response =
            approve_near_request(&wallet, &request("near_getAccounts", None, Value::Null)).await;

        let error = response.error.unwrap();
        assert_eq!(error.reason, "INVALID_CHAIN_ID");
        assert_eq!(error.code, -32602);
        assert!(response.result.is_none());
    }

    #[tokio::test]
    async fn malformed_chain_id_is_rejected() {
        let wallet = empty_wallet();
        let response = approve_near_request(
            &wallet,
            &request("near_getAccounts", Some("near:localnet"), Value::Null),
        )
        .await;
        assert_eq!(response.error.unwrap().reason, "INVALID_CHAIN_ID");
    }

    #[tokio::test]
    async fn unknown_method_is_rejected() {
        let wallet = empty_wallet();
        let response = approve_near_request(
            &wallet,
            &request("near_mintUnicorn", Some("near:testnet"), Value::Null),
        )
        .await;
        assert_eq!(response.error.unwrap().reason, "INVALID_ACTION");
    }

    #[tokio::test]
    async fn get_accounts_returns_result() {
        let wallet = empty_wallet();
        let response = approve_near_request(
            &wallet,
            &request("near_getAccounts", Some("near:testnet"), Value::Null),
        )
        .await;
        assert!(response.error.is_none());
        assert_eq!(response.result.unwrap(), json!([]));
    }

    #[tokio::test]
    async fn malformed_transaction_params_are_rejected() {
        let wallet = empty_wallet();
        let response = approve_near_request(
            &wallet,
            &request(
                "near_signAndSendTransaction",
                Some("near:testnet"),
                json!({"transaction": {"signerId": "alice.testnet"}}),
            ),
        )
        .await;
        assert_eq!(response.error.unwrap().reason, "INVALID_ACTION");
    }

    #[test]
    fn user_rejection_response() {
        let response =
            reject_near_request(&request("near_signIn", Some("near:testnet"), Value::Null));
        let error = response.error.unwrap();
        assert_eq!(error.code, 4001);
        assert_eq!(error.reason, "USER_REJECTED");
    }

    #[test]
    fn responses_serialize_without_empty_fields() {
        let ok = RpcResponse::result(7, json!({"x": 1}));
        let value = serde_json::to_value(&ok).unwrap();
        assert!(value.get("error").is_none());
        assert_eq!(value["jsonrpc"], "2.0");

        let err = RpcResponse::error(7, -32000, "GATEWAY_FAILURE", "boom".into());
        let value = serde_json::to_value(&err).unwrap();
        assert!(value.get("result").is_none());
        assert_eq!(value["error"]["reason"], "GATEWAY_FAILURE");
    }
}
