//! Ed25519 key material and NEAR's text encodings.
//!
//! NEAR renders keys as `ed25519:<base58>`: 32 bytes for a public key,
//! 64 bytes (seed followed by public key) for a secret key.

use std::fmt;

use ed25519_dalek::{Signer, SigningKey};

const ED25519_PREFIX: &str = "ed25519:";

/// Key parsing or decoding failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum KeyError {
    #[error("unsupported key type (expected `ed25519:` prefix): {0}")]
    UnknownKeyType(String),

    #[error("invalid base58 key data")]
    InvalidEncoding,

    #[error("invalid key length: {0} bytes")]
    InvalidLength(usize),
}

/// An ed25519 keypair held by a key store.
///
/// Signing is the only capability exposed to the rest of the wallet; the
/// seed never leaves this type except through [`secret_key`] for
/// persistence.
///
/// [`secret_key`]: KeyPair::secret_key
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a fresh random keypair.
    pub fn generate() -> Self {
        let seed: [u8; 32] = rand::random();
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    /// Parse a NEAR-encoded secret key (`ed25519:<base58>`).
    ///
    /// Accepts the canonical 64-byte seed+public encoding as well as a bare
    /// 32-byte seed.
    pub fn from_secret_key(s: &str) -> Result<Self, KeyError> {
        let data = decode_near_key(s)?;
        let seed: [u8; 32] = match data.len() {
            32 | 64 => data[..32]
                .try_into()
                .map_err(|_| KeyError::InvalidLength(data.len()))?,
            n => return Err(KeyError::InvalidLength(n)),
        };
        Ok(Self {
            signing_key: SigningKey::from_bytes(&seed),
        })
    }

    /// The 32 raw public key bytes.
    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// The NEAR-encoded public key, e.g. `ed25519:6E8sCci9...`.
    pub fn public_key(&self) -> String {
        encode_near_key(&self.public_key_bytes())
    }

    /// The NEAR-encoded secret key (64-byte seed+public encoding).
    pub fn secret_key(&self) -> String {
        let mut data = [0u8; 64];
        data[..32].copy_from_slice(&self.signing_key.to_bytes());
        data[32..].copy_from_slice(&self.public_key_bytes());
        encode_near_key(&data)
    }

    /// Sign a message (for transactions: the SHA-256 hash of the borsh
    /// serialization), returning the 64 raw signature bytes.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print the seed.
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key())
            .finish()
    }
}

/// Encode raw key bytes as `ed25519:<base58>`.
pub fn encode_near_key(bytes: &[u8]) -> String {
    format!("{ED25519_PREFIX}{}", bs58::encode(bytes).into_string())
}

/// Decode an `ed25519:<base58>` string into raw bytes.
fn decode_near_key(s: &str) -> Result<Vec<u8>, KeyError> {
    let encoded = s
        .strip_prefix(ED25519_PREFIX)
        .ok_or_else(|| KeyError::UnknownKeyType(s.split(':').next().unwrap_or("").to_string()))?;
    bs58::decode(encoded)
        .into_vec()
        .map_err(|_| KeyError::InvalidEncoding)
}

/// Parse a NEAR-encoded public key into its 32 raw bytes.
pub fn parse_public_key(s: &str) -> Result<[u8; 32], KeyError> {
    let data = decode_near_key(s)?;
    data.as_slice()
        .try_into()
        .map_err(|_| KeyError::InvalidLength(data.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_produces_distinct_keys() {
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        assert_ne!(a.public_key(), b.public_key());
    }

    #[test]
    fn secret_key_round_trip() {
        let pair = KeyPair::generate();
        let restored = KeyPair::from_secret_key(&pair.secret_key()).unwrap();
        assert_eq!(pair.public_key(), restored.public_key());
    }

    #[test]
    fn public_key_parse_round_trip() {
        let pair = KeyPair::generate();
        let bytes = parse_public_key(&pair.public_key()).unwrap();
        assert_eq!(bytes, pair.public_key_bytes());
    }

    #[test]
    fn rejects_unknown_key_type() {
        let err = parse_public_key("secp256k1:abc").unwrap_err();
        assert!(matches!(err, KeyError::UnknownKeyType(_)));
    }

    #[test]
    fn rejects_bad_base58() {
        let err = parse_public_key("ed25519:0OIl").unwrap_err();
        assert!(matches!(err, KeyError::InvalidEncoding));
    }

    #[test]
    fn rejects_wrong_length() {
        let short = encode_near_key(&[1u8; 16]);
        let err = parse_public_key(&short).unwrap_err();
        assert!(matches!(err, KeyError::InvalidLength(16)));
    }

    #[test]
    fn signature_verifies() {
        use ed25519_dalek::{Verifier, VerifyingKey};

        let pair = KeyPair::generate();
        let message = b"lantern";
        let signature = pair.sign(message);

        let verifying = VerifyingKey::from_bytes(&pair.public_key_bytes()).unwrap();
        let sig = ed25519_dalek::Signature::from_bytes(&signature);
        assert!(verifying.verify(message, &sig).is_ok());
    }

    #[test]
    fn debug_does_not_leak_seed() {
        let pair = KeyPair::generate();
        let rendered = format!("{pair:?}");
        assert!(rendered.contains("public_key"));
        assert!(!rendered.contains(&pair.secret_key()));
    }
}
