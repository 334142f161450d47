use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::chain::Chain;

/// Configuration for a single RPC endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    pub chain: Chain,
    pub url: String,
    pub is_custom: bool,
    pub timeout_secs: u64,
}

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Manages per-chain RPC endpoint configuration with custom override support.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfigStore {
    configs: HashMap<Chain, RpcConfig>,
}

impl RpcConfigStore {
    /// Create a store populated with the default public NEAR RPC URLs.
    pub fn with_defaults() -> Self {
        let configs = Chain::ALL
            .into_iter()
            .map(|chain| {
                let rpc = RpcConfig {
                    chain,
                    url: chain.default_rpc_url().to_string(),
                    is_custom: false,
                    timeout_secs: DEFAULT_TIMEOUT_SECS,
                };
                (chain, rpc)
            })
            .collect();

        Self { configs }
    }

    /// Get the RPC configuration for a chain. Returns `None` if the chain has
    /// no configuration (should not happen after [`with_defaults`]).
    ///
    /// [`with_defaults`]: RpcConfigStore::with_defaults
    pub fn get_rpc(&self, chain: Chain) -> Option<&RpcConfig> {
        self.configs.get(&chain)
    }

    /// Override the RPC URL for a chain with a custom endpoint.
    ///
    /// Returns `Err` if the URL fails validation.
    pub fn set_custom_rpc(&mut self, chain: Chain, url: String) -> anyhow::Result<()> {
        if !validate_url(&url) {
            anyhow::bail!("invalid RPC URL: {url}");
        }

        let entry = self.configs.entry(chain).or_insert_with(|| RpcConfig {
            chain,
            url: String::new(),
            is_custom: false,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        });
        entry.url = url;
        entry.is_custom = true;
        Ok(())
    }

    /// Reset a chain's RPC URL back to the built-in default.
    pub fn reset_to_default(&mut self, chain: Chain) {
        let entry = self.configs.entry(chain).or_insert_with(|| RpcConfig {
            chain,
            url: String::new(),
            is_custom: false,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        });
        entry.url = chain.default_rpc_url().to_string();
        entry.is_custom = false;
    }
}

impl Default for RpcConfigStore {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Validate that a URL is well-formed and uses HTTP or HTTPS.
pub fn validate_url(url: &str) -> bool {
    match url::Url::parse(url) {
        Ok(parsed) => {
            let scheme = parsed.scheme();
            (scheme == "http" || scheme == "https") && parsed.host().is_some()
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_all_chains() {
        let store = RpcConfigStore::with_defaults();
        for chain in Chain::ALL {
            assert!(store.get_rpc(chain).is_some());
        }
    }

    #[test]
    fn defaults_are_not_custom() {
        let store = RpcConfigStore::with_defaults();
        for chain in Chain::ALL {
            let rpc = store.get_rpc(chain).unwrap();
            assert!(!rpc.is_custom);
            assert_eq!(rpc.timeout_secs, DEFAULT_TIMEOUT_SECS);
        }
    }

    #[test]
    fn set_custom_rpc_marks_as_custom() {
        let mut store = RpcConfigStore::with_defaults();
        store
            .set_custom_rpc(Chain::Testnet, "https://my-node.example.com".into())
            .unwrap();

        let rpc = store.get_rpc(Chain::Testnet).unwrap();
        assert!(rpc.is_custom);
        assert_eq!(rpc.url, "https://my-node.example.com");
    }

    #[test]
    fn set_custom_rpc_rejects_invalid_url() {
        let mut store = RpcConfigStore::with_defaults();
        assert!(store.set_custom_rpc(Chain::Mainnet, "not-a-url".into()).is_err());
        assert!(
            store
                .set_custom_rpc(Chain::Mainnet, "ftp://files.example.com".into())
                .is_err()
        );
    }

    #[test]
    fn reset_to_default_restores_original_url() {
        let mut store = RpcConfigStore::with_defaults();
        let original = store.get_rpc(Chain::Testnet).unwrap().url.clone();

        store
            .set_custom_rpc(Chain::Testnet, "https://custom.example.com".into())
            .unwrap();
        assert_ne!(store.get_rpc(Chain::Testnet).unwrap().url, original);

        store.reset_to_default(Chain::Testnet);
        let after_reset = store.get_rpc(Chain::Testnet).unwrap();
        assert_eq!(after_reset.url, original);
        assert!(!after_reset.is_custom);
    }

    #[test]
    fn validate_url_accepts_http_and_https() {
        assert!(validate_url("https://rpc.testnet.near.org"));
        assert!(validate_url("http://localhost:3030"));
    }

    #[test]
    fn validate_url_rejects_garbage() {
        assert!(!validate_url(""));
        assert!(!validate_url("not a url"));
        assert!(!validate_url("ftp://server.com"));
        assert!(!validate_url("file:///etc/passwd"));
    }
}
