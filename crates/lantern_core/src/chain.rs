use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Supported NEAR networks.
///
/// Requests identify a network by its CAIP-2 chain id (`near:<network_id>`),
/// which is how WalletConnect sessions scope accounts to chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Mainnet,
    Testnet,
    Betanet,
}

/// A request carried a missing or malformed chain identifier.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid chain id: {0:?}")]
pub struct ChainIdError(pub String);

impl Chain {
    pub const ALL: [Chain; 3] = [Chain::Mainnet, Chain::Testnet, Chain::Betanet];

    /// Human-readable label for the chain.
    pub fn label(&self) -> &'static str {
        match self {
            Chain::Mainnet => "NEAR (Mainnet)",
            Chain::Testnet => "NEAR (Testnet)",
            Chain::Betanet => "NEAR (Betanet)",
        }
    }

    /// The bare network id, e.g. `testnet`. Used as the key vault namespace
    /// and in account derivation.
    pub fn network_id(&self) -> &'static str {
        match self {
            Chain::Mainnet => "mainnet",
            Chain::Testnet => "testnet",
            Chain::Betanet => "betanet",
        }
    }

    /// The CAIP-2 chain id, e.g. `near:testnet`.
    pub fn chain_id(&self) -> &'static str {
        match self {
            Chain::Mainnet => "near:mainnet",
            Chain::Testnet => "near:testnet",
            Chain::Betanet => "near:betanet",
        }
    }

    /// The default public RPC endpoint for this network.
    pub fn default_rpc_url(&self) -> &'static str {
        match self {
            Chain::Mainnet => "https://rpc.mainnet.near.org",
            Chain::Testnet => "https://rpc.testnet.near.org",
            Chain::Betanet => "https://rpc.betanet.near.org",
        }
    }
}

impl FromStr for Chain {
    type Err = ChainIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "near:mainnet" | "mainnet" => Ok(Chain::Mainnet),
            "near:testnet" | "testnet" => Ok(Chain::Testnet),
            "near:betanet" | "betanet" => Ok(Chain::Betanet),
            other => Err(ChainIdError(other.to_string())),
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.chain_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_caip2_and_bare_ids() {
        assert_eq!("near:testnet".parse::<Chain>().unwrap(), Chain::Testnet);
        assert_eq!("mainnet".parse::<Chain>().unwrap(), Chain::Mainnet);
        assert_eq!("betanet".parse::<Chain>().unwrap(), Chain::Betanet);
    }

    #[test]
    fn rejects_unknown_chain() {
        assert!("near:localnet".parse::<Chain>().is_err());
        assert!("".parse::<Chain>().is_err());
        assert!("eip155:1".parse::<Chain>().is_err());
    }

    #[test]
    fn chain_properties() {
        assert_eq!(Chain::Testnet.network_id(), "testnet");
        assert_eq!(Chain::Testnet.chain_id(), "near:testnet");
        assert_eq!(
            Chain::Mainnet.default_rpc_url(),
            "https://rpc.mainnet.near.org"
        );
        assert_eq!(Chain::Betanet.label(), "NEAR (Betanet)");
    }

    #[test]
    fn chain_display_is_caip2() {
        assert_eq!(format!("{}", Chain::Testnet), "near:testnet");
    }

    #[test]
    fn chain_serde_round_trip() {
        let json = serde_json::to_string(&Chain::Betanet).unwrap();
        assert_eq!(json, "\"betanet\"");
        let parsed: Chain = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, Chain::Betanet);
    }
}
