//! Access-key validation and signing-key selection.
//!
//! The validator is a pure predicate over a key's on-chain permission and a
//! proposed transaction. Selection takes the per-transaction candidate lists
//! (already checked against the chain by the wallet) and picks the signing
//! key for each transaction, preferring scoped keys and falling back to
//! full-access only when a batch requires elevation.

use tracing::debug;

use crate::action::{ActionDescriptor, TransactionRequest};
use crate::error::WalletError;
use crate::gateway::{AccessKeyPermissionView, AccessKeyView};
use crate::key::KeyPair;
use crate::wire;

/// Where a candidate key was found. Session-scoped keys are enumerated
/// before vault keys, so resolution prefers the most restrictive key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    /// Minted during this session's sign-in, scoped to one contract.
    Session,
    /// The account's persistent vault key.
    Vault,
}

/// A key that validated against a transaction, ready to sign it.
#[derive(Debug, Clone)]
pub struct ResolvedAccess {
    pub keypair: KeyPair,
    pub public_key: wire::PublicKey,
    pub access_key: AccessKeyView,
    pub source: KeySource,
}

/// The signing keys selected for a batch.
#[derive(Debug, Clone)]
pub struct BatchAccess {
    pub accesses: Vec<ResolvedAccess>,
    /// True when some transaction in the batch validates only under a
    /// full-access key. The whole batch then signs with full-access keys and
    /// the surrounding handler must obtain explicit user confirmation.
    pub elevated: bool,
}

/// Decide whether `access_key` may authorize `transaction` without further
/// user confirmation. Pure; no side effects or network calls.
///
/// A full-access key authorizes anything for its owning account. A scoped
/// (function-call) key authorizes only transactions to its bound receiver
/// where every action is a `FunctionCall` with zero deposit and the called
/// method is in the key's allowed set (an empty set means all methods).
pub fn validate_access_key(access_key: &AccessKeyView, transaction: &TransactionRequest) -> bool {
    let permission = match &access_key.permission {
        AccessKeyPermissionView::FullAccess => return true,
        AccessKeyPermissionView::FunctionCall(fc) => fc,
    };

    if transaction.receiver_id != permission.receiver_id {
        return false;
    }

    transaction.actions.iter().all(|action| match action {
        ActionDescriptor::FunctionCall {
            method_name,
            deposit,
            ..
        } => {
            let method_allowed = permission.method_names.is_empty()
                || permission.method_names.iter().any(|m| m == method_name);
            method_allowed && *deposit == 0
        }
        _ => false,
    })
}

/// Select the signing key for each transaction in a batch.
///
/// `candidates[i]` holds every key that validated transaction `i`, in
/// precedence order (session keys first). A transaction with no validating
/// key fails the whole batch with `NoAuthorizedKey`. When any transaction
/// validates only under full-access, every transaction must sign with a
/// full-access key so the confirmation shown to the user matches the keys
/// actually used.
pub(crate) fn select_batch(
    transactions: &[TransactionRequest],
    candidates: Vec<Vec<ResolvedAccess>>,
) -> Result<BatchAccess, WalletError> {
    debug_assert_eq!(transactions.len(), candidates.len());

    for (tx, list) in transactions.iter().zip(&candidates) {
        if list.is_empty() {
            return Err(WalletError::NoAuthorizedKey(tx.signer_id.clone()));
        }
    }

    let elevated = candidates
        .iter()
        .any(|list| list.iter().all(|c| c.access_key.is_full_access()));

    let mut accesses = Vec::with_capacity(candidates.len());
    for (tx, list) in transactions.iter().zip(candidates) {
        let chosen = if elevated {
            list.into_iter()
                .find(|c| c.access_key.is_full_access())
                .ok_or_else(|| WalletError::NoAuthorizedKey(tx.signer_id.clone()))?
        } else {
            // Precedence order puts the most restrictive validating key first.
            list.into_iter().next().expect("checked non-empty above")
        };

        debug!(
            signer_id = %tx.signer_id,
            source = ?chosen.source,
            full_access = chosen.access_key.is_full_access(),
            "selected signing key"
        );
        accesses.push(chosen);
    }

    Ok(BatchAccess { accesses, elevated })
}
