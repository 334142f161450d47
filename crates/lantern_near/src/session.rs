//! Session store: read-only view of which accounts a session may sign for.
//!
//! Sessions are owned by the surrounding WalletConnect plumbing; the core
//! only reads authorized-account sets to check that a signer is in scope.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use lantern_core::Chain;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// A chain-qualified account reference, CAIP-10 style:
/// `near:<network>:<account_id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountRef {
    pub chain: Chain,
    pub account_id: String,
}

impl AccountRef {
    pub fn new(chain: Chain, account_id: impl Into<String>) -> Self {
        Self {
            chain,
            account_id: account_id.into(),
        }
    }
}

impl FromStr for AccountRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let (ns, network, account) = match (parts.next(), parts.next(), parts.next()) {
            (Some(ns), Some(network), Some(account)) if !account.is_empty() => {
                (ns, network, account)
            }
            _ => return Err(format!("malformed account reference: {s:?}")),
        };

        let chain = format!("{ns}:{network}")
            .parse::<Chain>()
            .map_err(|e| e.to_string())?;

        Ok(AccountRef {
            chain,
            account_id: account.to_string(),
        })
    }
}

impl TryFrom<String> for AccountRef {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<AccountRef> for String {
    fn from(r: AccountRef) -> Self {
        r.to_string()
    }
}

impl fmt::Display for AccountRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chain.chain_id(), self.account_id)
    }
}

/// Read interface onto the session registry.
pub trait SessionStore: Send + Sync {
    /// Accounts authorized under the session's NEAR namespace, or `None` if
    /// the topic is unknown.
    fn authorized_accounts(&self, topic: &str) -> Option<Vec<AccountRef>>;
}

/// Session registry backed by a map, for embedding and tests.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Vec<AccountRef>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a session's authorized accounts.
    pub fn insert(&self, topic: impl Into<String>, accounts: Vec<AccountRef>) {
        self.sessions.write().insert(topic.into(), accounts);
    }

    /// Forget a session.
    pub fn remove(&self, topic: &str) {
        self.sessions.write().remove(topic);
    }
}

impl SessionStore for InMemorySessionStore {
    fn authorized_accounts(&self, topic: &str) -> Option<Vec<AccountRef>> {
        self.sessions.read().get(topic).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_caip10_reference() {
        let r: AccountRef = "near:testnet:alice.testnet".parse().unwrap();
        assert_eq!(r.chain, Chain::Testnet);
        assert_eq!(r.account_id, "alice.testnet");
        assert_eq!(r.to_string(), "near:testnet:alice.testnet");
    }

    #[test]
    fn account_id_may_contain_separators() {
        // Implicit account ids are 64 hex chars; named ids can nest dots.
        let r: AccountRef = "near:mainnet:sub.account.near".parse().unwrap();
        assert_eq!(r.account_id, "sub.account.near");
    }

    #[test]
    fn rejects_malformed_references() {
        assert!("alice.testnet".parse::<AccountRef>().is_err());
        assert!("near:testnet".parse::<AccountRef>().is_err());
        assert!("near:testnet:".parse::<AccountRef>().is_err());
        assert!("eip155:1:0xabc".parse::<AccountRef>().is_err());
    }

    #[test]
    fn serde_uses_string_form() {
        let r = AccountRef::new(Chain::Testnet, "alice.testnet");
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json, "\"near:testnet:alice.testnet\"");
        let parsed: AccountRef = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, r);
    }

    #[test]
    fn store_lookup_and_removal() {
        let store = InMemorySessionStore::new();
        assert!(store.authorized_accounts("topic1").is_none());

        store.insert(
            "topic1",
            vec![AccountRef::new(Chain::Testnet, "alice.testnet")],
        );
        let accounts = store.authorized_accounts("topic1").unwrap();
        assert_eq!(accounts.len(), 1);

        store.remove("topic1");
        assert!(store.authorized_accounts("topic1").is_none());
    }
}
