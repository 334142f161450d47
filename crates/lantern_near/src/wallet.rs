//! The wallet context object: transaction building, signing, submission,
//! and session-scoped key lifecycle.
//!
//! One `NearWallet` is owned by the application's session lifecycle and
//! passed explicitly to every handler; there is no module-level singleton.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use lantern_core::Chain;
use lantern_core::rpc::RpcConfigStore;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::access::{self, BatchAccess, KeySource, ResolvedAccess, validate_access_key};
use crate::action::{
    ActionDescriptor, PermissionDescriptor, TransactionRequest, translate_actions,
};
use crate::error::WalletError;
use crate::gateway::{ChainGateway, ExecutionOutcome, Finality, GatewayError, JsonRpcGateway};
use crate::key::KeyPair;
use crate::keystore::{KeyStore, session_namespace};
use crate::session::SessionStore;
use crate::wire;

/// An account exposed to the surrounding request handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub account_id: String,
    pub public_key: String,
}

/// What to do when one transaction in a batch fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchPolicy {
    /// Abort the whole batch on the first failure. The default: a partially
    /// submitted batch can leave inconsistent on-chain state.
    #[default]
    FailFast,
    /// Log the failure, skip the transaction, and continue. Outcomes of
    /// skipped transactions are omitted from the returned list.
    Skip,
}

/// Result of a sign-out: which session keys were revoked on-chain and
/// removed locally, and which failed and were kept.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignOutOutcome {
    pub removed: Vec<Account>,
    pub failed: Vec<Account>,
}

/// The NEAR wallet core.
///
/// Holds the persistent key vault, the session-scoped key store, the session
/// registry, and one gateway per configured chain.
pub struct NearWallet {
    gateways: HashMap<Chain, Arc<dyn ChainGateway>>,
    vault: Arc<dyn KeyStore>,
    session_keys: Arc<dyn KeyStore>,
    sessions: Arc<dyn SessionStore>,
}

impl NearWallet {
    /// Create a wallet with explicit gateways (used by tests and embedders
    /// that bring their own transport).
    pub fn new(
        gateways: HashMap<Chain, Arc<dyn ChainGateway>>,
        vault: Arc<dyn KeyStore>,
        session_keys: Arc<dyn KeyStore>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            gateways,
            vault,
            session_keys,
            sessions,
        }
    }

    /// Create a wallet with a JSON-RPC gateway per configured chain.
    pub fn from_rpc_config(
        config: &RpcConfigStore,
        vault: Arc<dyn KeyStore>,
        session_keys: Arc<dyn KeyStore>,
        sessions: Arc<dyn SessionStore>,
    ) -> Result<Self, WalletError> {
        let mut gateways: HashMap<Chain, Arc<dyn ChainGateway>> = HashMap::new();
        for chain in Chain::ALL {
            if let Some(rpc) = config.get_rpc(chain) {
                let gateway =
                    JsonRpcGateway::new(rpc.url.clone(), Duration::from_secs(rpc.timeout_secs))
                        .map_err(WalletError::Gateway)?;
                gateways.insert(chain, Arc::new(gateway));
            }
        }
        Ok(Self::new(gateways, vault, session_keys, sessions))
    }

    fn parse_chain(chain_id: &str) -> Result<Chain, WalletError> {
        chain_id
            .parse::<Chain>()
            .map_err(|_| WalletError::InvalidChainId(chain_id.to_string()))
    }

    fn gateway(&self, chain: Chain) -> Result<&Arc<dyn ChainGateway>, WalletError> {
        self.gateways
            .get(&chain)
            .ok_or_else(|| WalletError::InvalidChainId(chain.chain_id().to_string()))
    }

    /// All accounts held in the persistent vault for a chain.
    pub fn get_accounts(&self, chain_id: &str) -> Result<Vec<Account>, WalletError> {
        let chain = Self::parse_chain(chain_id)?;
        let namespace = chain.network_id();
        let account_ids = self
            .vault
            .list_accounts(namespace)
            .map_err(|e| WalletError::Keystore(e.to_string()))?;

        let mut accounts = Vec::with_capacity(account_ids.len());
        for account_id in account_ids {
            let Some(pair) = self
                .vault
                .get_key(namespace, &account_id)
                .map_err(|e| WalletError::Keystore(e.to_string()))?
            else {
                continue;
            };
            accounts.push(Account {
                account_id,
                public_key: pair.public_key(),
            });
        }
        Ok(accounts)
    }

    // ---- Access resolution ----

    /// All keys available to the transaction's signer that validate it, in
    /// precedence order: session-scoped keys first, vault keys second.
    async fn transaction_permissions(
        &self,
        chain: Chain,
        topic: &str,
        transaction: &TransactionRequest,
    ) -> Result<Vec<ResolvedAccess>, WalletError> {
        let authorized = self
            .sessions
            .authorized_accounts(topic)
            .ok_or_else(|| WalletError::UnknownSession(topic.to_string()))?;

        let in_scope = authorized
            .iter()
            .any(|r| r.chain == chain && r.account_id == transaction.signer_id);
        if !in_scope {
            return Err(WalletError::UnauthorizedSigner(
                transaction.signer_id.clone(),
            ));
        }

        let gateway = self.gateway(chain)?;
        let session_ns = session_namespace(chain.chain_id(), topic);
        let candidates = [
            (KeySource::Session, &self.session_keys, session_ns.as_str()),
            (KeySource::Vault, &self.vault, chain.network_id()),
        ];

        let mut permissions = Vec::new();
        for (source, store, namespace) in candidates {
            let Some(keypair) = store
                .get_key(namespace, &transaction.signer_id)
                .map_err(|e| WalletError::Keystore(e.to_string()))?
            else {
                continue;
            };

            let public_key = wire::PublicKey::Ed25519(keypair.public_key_bytes());
            let view = match gateway
                .view_access_key(&transaction.signer_id, &public_key)
                .await
            {
                Ok(view) => view,
                Err(GatewayError::UnknownAccessKey { .. }) => {
                    // A locally held key that no longer exists on-chain is
                    // not a usable candidate.
                    debug!(
                        signer_id = %transaction.signer_id,
                        source = ?source,
                        "skipping key unknown to the chain"
                    );
                    continue;
                }
                Err(other) => return Err(other.into()),
            };

            if validate_access_key(&view, transaction) {
                permissions.push(ResolvedAccess {
                    keypair,
                    public_key,
                    access_key: view,
                    source,
                });
            }
        }

        Ok(permissions)
    }

    async fn resolve_batch(
        &self,
        chain: Chain,
        topic: &str,
        transactions: &[TransactionRequest],
    ) -> Result<BatchAccess, WalletError> {
        let mut candidates = Vec::with_capacity(transactions.len());
        for transaction in transactions {
            candidates.push(
                self.transaction_permissions(chain, topic, transaction)
                    .await?,
            );
        }
        access::select_batch(transactions, candidates)
    }

    /// Whether signing this batch requires a full-access key for some
    /// transaction, the signal for the surrounding handler to obtain
    /// explicit user confirmation before calling `sign_and_send_*`.
    pub async fn is_elevated_permission(
        &self,
        chain_id: &str,
        topic: &str,
        transactions: &[TransactionRequest],
    ) -> Result<bool, WalletError> {
        let chain = Self::parse_chain(chain_id)?;
        let batch = self.resolve_batch(chain, topic, transactions).await?;
        Ok(batch.elevated)
    }

    // ---- Signing and submission ----

    /// Sign a batch without submitting. Each transaction gets a fresh block
    /// hash and nonce; when one signer recurs in the batch, nonces are
    /// advanced locally so the signed set stays submittable in order.
    pub async fn sign_transactions(
        &self,
        chain_id: &str,
        topic: &str,
        transactions: &[TransactionRequest],
    ) -> Result<Vec<wire::SignedTransaction>, WalletError> {
        let chain = Self::parse_chain(chain_id)?;
        let batch = self.resolve_batch(chain, topic, transactions).await?;
        if batch.elevated {
            info!("elevated permission required for all transactions in batch");
        }

        let mut signed = Vec::with_capacity(transactions.len());
        let mut last_nonce: HashMap<(String, String), u64> = HashMap::new();
        for (transaction, resolved) in transactions.iter().zip(&batch.accesses) {
            signed.push(
                self.sign_one(chain, transaction, resolved, &mut last_nonce)
                    .await?,
            );
        }
        Ok(signed)
    }

    /// Build and sign one transaction against fresh chain state.
    async fn sign_one(
        &self,
        chain: Chain,
        transaction: &TransactionRequest,
        resolved: &ResolvedAccess,
        last_nonce: &mut HashMap<(String, String), u64>,
    ) -> Result<wire::SignedTransaction, WalletError> {
        let gateway = self.gateway(chain)?;

        // Block hash and access key are independent reads; fetch in parallel.
        let (block, view) = tokio::try_join!(
            gateway.view_block(Finality::Final),
            gateway.view_access_key(&transaction.signer_id, &resolved.public_key),
        )?;

        let nonce_key = (
            transaction.signer_id.clone(),
            resolved.public_key.to_near_string(),
        );
        let nonce = match last_nonce.get(&nonce_key) {
            // Same key used earlier in this batch: the chain may not have
            // caught up yet, so advance past what we already used.
            Some(used) => (view.nonce + 1).max(used + 1),
            None => view.nonce + 1,
        };
        last_nonce.insert(nonce_key, nonce);

        let unsigned = wire::Transaction {
            signer_id: transaction.signer_id.clone(),
            public_key: resolved.public_key.clone(),
            nonce,
            receiver_id: transaction.receiver_id.clone(),
            block_hash: block.hash,
            actions: translate_actions(&transaction.actions)?,
        };

        debug!(
            signer_id = %unsigned.signer_id,
            receiver_id = %unsigned.receiver_id,
            nonce,
            actions = unsigned.actions.len(),
            "signing transaction"
        );

        let hash = unsigned.hash()?;
        let signature = resolved.keypair.sign(&hash);
        Ok(wire::SignedTransaction {
            transaction: unsigned,
            signature: wire::Signature::Ed25519(signature),
        })
    }

    /// Resolve, sign, and submit a single transaction.
    pub async fn sign_and_send_transaction(
        &self,
        chain_id: &str,
        topic: &str,
        transaction: &TransactionRequest,
    ) -> Result<ExecutionOutcome, WalletError> {
        let outcomes = self
            .sign_and_send_transactions(
                chain_id,
                topic,
                std::slice::from_ref(transaction),
                BatchPolicy::FailFast,
            )
            .await?;
        Ok(outcomes.into_iter().next().expect("one outcome per input"))
    }

    /// Resolve, sign, and submit a batch.
    ///
    /// Transactions are signed and submitted strictly in order, one at a
    /// time, so each nonce read reflects prior submissions when a signer
    /// recurs in the batch.
    pub async fn sign_and_send_transactions(
        &self,
        chain_id: &str,
        topic: &str,
        transactions: &[TransactionRequest],
        policy: BatchPolicy,
    ) -> Result<Vec<ExecutionOutcome>, WalletError> {
        let chain = Self::parse_chain(chain_id)?;
        let gateway = self.gateway(chain)?;
        let batch = self.resolve_batch(chain, topic, transactions).await?;
        if batch.elevated {
            info!("elevated permission required for all transactions in batch");
        }

        let mut outcomes = Vec::with_capacity(transactions.len());
        let mut last_nonce = HashMap::new();
        for (index, (transaction, resolved)) in
            transactions.iter().zip(&batch.accesses).enumerate()
        {
            let result = async {
                let signed = self
                    .sign_one(chain, transaction, resolved, &mut last_nonce)
                    .await?;
                gateway.submit(&signed).await.map_err(WalletError::from)
            }
            .await;

            match result {
                Ok(outcome) => {
                    info!(
                        signer_id = %transaction.signer_id,
                        receiver_id = %transaction.receiver_id,
                        tx = index + 1,
                        of = transactions.len(),
                        hash = outcome.transaction_hash().unwrap_or(""),
                        "transaction submitted"
                    );
                    outcomes.push(outcome);
                }
                Err(err) => match policy {
                    BatchPolicy::FailFast => return Err(err),
                    BatchPolicy::Skip => {
                        warn!(
                            signer_id = %transaction.signer_id,
                            tx = index + 1,
                            of = transactions.len(),
                            error = %err,
                            "skipping failed transaction"
                        );
                    }
                },
            }
        }
        Ok(outcomes)
    }

    // ---- Session-scoped authorization ----

    /// Mint a scoped function-call key for every account authorized under
    /// the session and register each on-chain via `AddKey`.
    ///
    /// Per-account failures are logged and skipped; only accounts whose key
    /// was registered both on-chain and locally are returned.
    pub async fn sign_in(
        &self,
        chain_id: &str,
        topic: &str,
        contract_id: &str,
        method_names: &[String],
    ) -> Result<Vec<Account>, WalletError> {
        let chain = Self::parse_chain(chain_id)?;
        let authorized = self
            .sessions
            .authorized_accounts(topic)
            .ok_or_else(|| WalletError::UnknownSession(topic.to_string()))?;
        let namespace = session_namespace(chain.chain_id(), topic);

        let mut result = Vec::new();
        for account_ref in authorized.iter().filter(|r| r.chain == chain) {
            let account_id = &account_ref.account_id;
            let keypair = KeyPair::generate();
            let public_key = keypair.public_key();

            let request = TransactionRequest {
                signer_id: account_id.clone(),
                receiver_id: account_id.clone(),
                actions: vec![ActionDescriptor::add_key(
                    &public_key,
                    PermissionDescriptor::function_call(contract_id, method_names.to_vec()),
                )],
            };

            match self
                .sign_and_send_transaction(chain_id, topic, &request)
                .await
            {
                Ok(_) => {
                    self.session_keys
                        .set_key(&namespace, account_id, keypair)
                        .map_err(|e| WalletError::Keystore(e.to_string()))?;
                    info!(account_id = %account_id, contract_id = %contract_id, "function-call key registered");
                    result.push(Account {
                        account_id: account_id.clone(),
                        public_key,
                    });
                }
                Err(err) => {
                    warn!(
                        account_id = %account_id,
                        error = %err,
                        "failed to create function-call access key"
                    );
                }
            }
        }
        Ok(result)
    }

    /// Revoke every session-scoped key via `DeleteKey`.
    ///
    /// A key is removed from the local store only once its on-chain
    /// revocation succeeds; failed revocations keep the key and are reported
    /// in [`SignOutOutcome::failed`]. Idempotent: a repeat call finds no
    /// session keys and returns empty lists.
    pub async fn sign_out(
        &self,
        chain_id: &str,
        topic: &str,
    ) -> Result<SignOutOutcome, WalletError> {
        let chain = Self::parse_chain(chain_id)?;
        let namespace = session_namespace(chain.chain_id(), topic);
        let account_ids = self
            .session_keys
            .list_accounts(&namespace)
            .map_err(|e| WalletError::Keystore(e.to_string()))?;

        let mut outcome = SignOutOutcome::default();
        for account_id in account_ids {
            let Some(keypair) = self
                .session_keys
                .get_key(&namespace, &account_id)
                .map_err(|e| WalletError::Keystore(e.to_string()))?
            else {
                continue;
            };
            let public_key = keypair.public_key();
            let account = Account {
                account_id: account_id.clone(),
                public_key: public_key.clone(),
            };

            let request = TransactionRequest {
                signer_id: account_id.clone(),
                receiver_id: account_id.clone(),
                actions: vec![ActionDescriptor::delete_key(&public_key)],
            };

            match self
                .sign_and_send_transaction(chain_id, topic, &request)
                .await
            {
                Ok(_) => {
                    self.session_keys
                        .remove_key(&namespace, &account_id)
                        .map_err(|e| WalletError::Keystore(e.to_string()))?;
                    info!(account_id = %account_id, "function-call key revoked");
                    outcome.removed.push(account);
                }
                Err(err) => {
                    // Keep the key locally so a retry can still revoke it.
                    warn!(
                        account_id = %account_id,
                        error = %err,
                        "failed to revoke function-call access key"
                    );
                    outcome.failed.push(account);
                }
            }
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keystore::InMemoryKeyStore;
    use crate::session::InMemorySessionStore;

    #[test]
    fn get_accounts_lists_vault_keys() {
        let vault = Arc::new(InMemoryKeyStore::new());
        let pair = KeyPair::generate();
        let public = pair.public_key();
        vault.set_key("testnet", "alice.testnet", pair).unwrap();

        let wallet = NearWallet::new(
            HashMap::new(),
            vault,
            Arc::new(InMemoryKeyStore::new()),
            Arc::new(InMemorySessionStore::new()),
        );

        let accounts = wallet.get_accounts("near:testnet").unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].account_id, "alice.testnet");
        assert_eq!(accounts[0].public_key, public);
    }

    #[test]
    fn get_accounts_rejects_bad_chain_id() {
        let wallet = NearWallet::new(
            HashMap::new(),
            Arc::new(InMemoryKeyStore::new()),
            Arc::new(InMemoryKeyStore::new()),
            Arc::new(InMemorySessionStore::new()),
        );
        let err = wallet.get_accounts("near:localnet").unwrap_err();
        assert!(matches!(err, WalletError::InvalidChainId(_)));
    }

    #[tokio::test]
    async fn unknown_topic_is_rejected_before_any_network_call() {
        // No gateways configured: if this reached the network it would fail
        // with InvalidChainId instead of UnknownSession.
        let wallet = NearWallet::new(
            HashMap::new(),
            Arc::new(InMemoryKeyStore::new()),
            Arc::new(InMemoryKeyStore::new()),
            Arc::new(InMemorySessionStore::new()),
        );

        let tx = TransactionRequest {
            signer_id: "alice.testnet".into(),
            receiver_id: "contract.testnet".into(),
            actions: vec![],
        };
        let err = wallet
            .is_elevated_permission("near:testnet", "no-such-topic", &[tx])
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::UnknownSession(_)));
    }

    #[test]
    fn batch_policy_defaults_to_fail_fast() {
        assert_eq!(BatchPolicy::default(), BatchPolicy::FailFast);
    }
}
