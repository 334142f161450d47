//! NEAR transaction wire format.
//!
//! These types mirror the protocol's borsh schema exactly; variant order is
//! part of the encoding and must not be rearranged. The wallet only ever
//! constructs `FunctionCall`, `AddKey` and `DeleteKey` actions, but the full
//! action set is declared so the discriminants line up with the chain's.

use borsh::{BorshDeserialize, BorshSerialize};
use sha2::{Digest, Sha256};

use crate::key;

/// A public key on the wire: key type discriminant followed by raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum PublicKey {
    Ed25519([u8; 32]),
    Secp256k1([u8; 64]),
}

impl PublicKey {
    /// Parse a NEAR-encoded public key string (`ed25519:<base58>`).
    pub fn parse(s: &str) -> Result<Self, key::KeyError> {
        key::parse_public_key(s).map(PublicKey::Ed25519)
    }

    /// Render back to the NEAR text encoding.
    pub fn to_near_string(&self) -> String {
        match self {
            PublicKey::Ed25519(bytes) => key::encode_near_key(bytes),
            PublicKey::Secp256k1(bytes) => {
                format!("secp256k1:{}", bs58::encode(bytes).into_string())
            }
        }
    }
}

/// A signature on the wire, tagged with its key type.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum Signature {
    Ed25519([u8; 64]),
    Secp256k1([u8; 65]),
}

/// An access key: its next-nonce counter plus its permission scope.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct AccessKey {
    pub nonce: u64,
    pub permission: AccessKeyPermission,
}

impl AccessKey {
    pub fn full_access() -> Self {
        Self {
            nonce: 0,
            permission: AccessKeyPermission::FullAccess,
        }
    }

    pub fn function_call(
        receiver_id: String,
        method_names: Vec<String>,
        allowance: Option<u128>,
    ) -> Self {
        Self {
            nonce: 0,
            permission: AccessKeyPermission::FunctionCall(FunctionCallPermission {
                allowance,
                receiver_id,
                method_names,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum AccessKeyPermission {
    FunctionCall(FunctionCallPermission),
    FullAccess,
}

/// Scope of a function-call access key: one receiver contract, optionally a
/// method allow-list (empty = all methods) and a spending allowance.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct FunctionCallPermission {
    pub allowance: Option<u128>,
    pub receiver_id: String,
    pub method_names: Vec<String>,
}

/// A transaction action. Executes in sequence order on-chain.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum Action {
    CreateAccount,
    DeployContract {
        code: Vec<u8>,
    },
    FunctionCall {
        method_name: String,
        args: Vec<u8>,
        gas: u64,
        deposit: u128,
    },
    Transfer {
        deposit: u128,
    },
    Stake {
        stake: u128,
        public_key: PublicKey,
    },
    AddKey {
        public_key: PublicKey,
        access_key: AccessKey,
    },
    DeleteKey {
        public_key: PublicKey,
    },
    DeleteAccount {
        beneficiary_id: String,
    },
}

/// An unsigned transaction.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Transaction {
    pub signer_id: String,
    pub public_key: PublicKey,
    pub nonce: u64,
    pub receiver_id: String,
    pub block_hash: [u8; 32],
    pub actions: Vec<Action>,
}

impl Transaction {
    /// Borsh-serialize the transaction.
    pub fn to_bytes(&self) -> std::io::Result<Vec<u8>> {
        borsh::to_vec(self)
    }

    /// The transaction hash that gets signed: SHA-256 of the borsh bytes.
    pub fn hash(&self) -> std::io::Result<[u8; 32]> {
        let bytes = self.to_bytes()?;
        Ok(Sha256::digest(&bytes).into())
    }
}

/// A signed transaction, opaque except for serialization.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct SignedTransaction {
    pub transaction: Transaction,
    pub signature: Signature,
}

impl SignedTransaction {
    /// Borsh-serialize the signed transaction.
    pub fn to_bytes(&self) -> std::io::Result<Vec<u8>> {
        borsh::to_vec(self)
    }

    /// Base64 of the borsh bytes, the encoding `broadcast_tx_commit` expects.
    pub fn to_base64(&self) -> std::io::Result<String> {
        use base64::Engine;
        Ok(base64::engine::general_purpose::STANDARD.encode(self.to_bytes()?))
    }
}

/// Decode a base58 block hash string into its 32 raw bytes.
pub fn decode_block_hash(s: &str) -> Option<[u8; 32]> {
    let bytes = bs58::decode(s).into_vec().ok()?;
    bytes.try_into().ok()
}
