//! Key storage: the vault and the session-scoped key store.
//!
//! [`KeyStore`] is the pluggable capability both stores implement. Keys are
//! namespaced: the persistent vault uses the bare network id (`testnet`),
//! session-scoped function-call keys use `<chain_id>:<topic>` so sign-out can
//! enumerate exactly the keys minted for one session.
//!
//! Writes are atomic with respect to reads: the resolver never observes a
//! half-registered key.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::key::KeyPair;

const AES_NONCE_LEN: usize = 12;

/// Pluggable key storage capability.
///
/// Implementations are selected by configuration, not by code duplication:
/// the wallet takes any two `KeyStore`s for vault and session keys.
pub trait KeyStore: Send + Sync {
    /// Look up the keypair for an account, if present.
    fn get_key(&self, namespace: &str, account_id: &str) -> Result<Option<KeyPair>>;

    /// Register (or replace) a keypair for an account.
    fn set_key(&self, namespace: &str, account_id: &str, key: KeyPair) -> Result<()>;

    /// Remove an account's keypair. Returns the removed pair if it existed.
    fn remove_key(&self, namespace: &str, account_id: &str) -> Result<Option<KeyPair>>;

    /// All account ids with a key in the given namespace, sorted.
    fn list_accounts(&self, namespace: &str) -> Result<Vec<String>>;
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Volatile key store for embedding and tests.
#[derive(Default)]
pub struct InMemoryKeyStore {
    keys: RwLock<HashMap<(String, String), KeyPair>>,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyStore for InMemoryKeyStore {
    fn get_key(&self, namespace: &str, account_id: &str) -> Result<Option<KeyPair>> {
        let keys = self.keys.read();
        Ok(keys
            .get(&(namespace.to_string(), account_id.to_string()))
            .cloned())
    }

    fn set_key(&self, namespace: &str, account_id: &str, key: KeyPair) -> Result<()> {
        self.keys
            .write()
            .insert((namespace.to_string(), account_id.to_string()), key);
        Ok(())
    }

    fn remove_key(&self, namespace: &str, account_id: &str) -> Result<Option<KeyPair>> {
        Ok(self
            .keys
            .write()
            .remove(&(namespace.to_string(), account_id.to_string())))
    }

    fn list_accounts(&self, namespace: &str) -> Result<Vec<String>> {
        let keys = self.keys.read();
        let mut accounts: Vec<String> = keys
            .keys()
            .filter(|(ns, _)| ns == namespace)
            .map(|(_, account)| account.clone())
            .collect();
        accounts.sort();
        Ok(accounts)
    }
}

// ---------------------------------------------------------------------------
// Encrypted file store
// ---------------------------------------------------------------------------

/// A persisted key record. The secret key is encrypted; everything else is
/// plaintext so accounts can be listed without the password.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct KeyRecord {
    namespace: String,
    account_id: String,
    public_key: String,
    encrypted_secret: Vec<u8>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct KeyFile {
    records: Vec<KeyRecord>,
}

/// Key store persisted to a JSON file with AES-256-GCM encrypted secrets.
///
/// The encryption key is derived from the password with Argon2id. The file
/// is written with owner-only permissions on Unix.
pub struct FileKeyStore {
    path: PathBuf,
    password: String,
    records: RwLock<HashMap<(String, String), KeyRecord>>,
}

impl FileKeyStore {
    /// Open (or create) a key store at `path`. Loads existing records; a
    /// missing file starts empty.
    pub fn open(path: impl Into<PathBuf>, password: impl Into<String>) -> Result<Self> {
        let path = path.into();
        let records = if path.exists() {
            let json = std::fs::read_to_string(&path).context("failed to read key store file")?;
            let file: KeyFile =
                serde_json::from_str(&json).context("failed to deserialize key store")?;
            info!(path = %path.display(), count = file.records.len(), "key store loaded");
            file.records
                .into_iter()
                .map(|r| ((r.namespace.clone(), r.account_id.clone()), r))
                .collect()
        } else {
            info!(path = %path.display(), "key store file not found, starting empty");
            HashMap::new()
        };

        Ok(Self {
            path,
            password: password.into(),
            records: RwLock::new(records),
        })
    }

    fn persist(&self, records: &HashMap<(String, String), KeyRecord>) -> Result<()> {
        let mut file = KeyFile {
            records: records.values().cloned().collect(),
        };
        file.records
            .sort_by(|a, b| (&a.namespace, &a.account_id).cmp(&(&b.namespace, &b.account_id)));

        let json = serde_json::to_string_pretty(&file).context("failed to serialize key store")?;
        std::fs::write(&self.path, json).context("failed to write key store file")?;

        // Restrict file permissions to owner-only on Unix (0o600 = rw-------).
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .context("failed to set key store file permissions")?;
        }

        Ok(())
    }
}

impl KeyStore for FileKeyStore {
    fn get_key(&self, namespace: &str, account_id: &str) -> Result<Option<KeyPair>> {
        let records = self.records.read();
        let Some(record) = records.get(&(namespace.to_string(), account_id.to_string())) else {
            return Ok(None);
        };
        let secret = decrypt_secret(&record.encrypted_secret, &self.password)?;
        let secret = String::from_utf8(secret).context("decrypted secret is not UTF-8")?;
        let pair = KeyPair::from_secret_key(&secret)
            .map_err(|e| anyhow::anyhow!("stored key is unusable: {e}"))?;
        Ok(Some(pair))
    }

    fn set_key(&self, namespace: &str, account_id: &str, key: KeyPair) -> Result<()> {
        let record = KeyRecord {
            namespace: namespace.to_string(),
            account_id: account_id.to_string(),
            public_key: key.public_key(),
            encrypted_secret: encrypt_secret(key.secret_key().as_bytes(), &self.password)?,
            created_at: Utc::now(),
        };

        let mut records = self.records.write();
        info!(namespace = %namespace, account_id = %account_id, "key registered");
        records.insert((namespace.to_string(), account_id.to_string()), record);
        self.persist(&records)
    }

    fn remove_key(&self, namespace: &str, account_id: &str) -> Result<Option<KeyPair>> {
        let mut records = self.records.write();
        let removed = records.remove(&(namespace.to_string(), account_id.to_string()));
        if removed.is_some() {
            info!(namespace = %namespace, account_id = %account_id, "key removed");
            self.persist(&records)?;
        }
        drop(records);

        match removed {
            Some(record) => {
                let secret = decrypt_secret(&record.encrypted_secret, &self.password)?;
                let secret = String::from_utf8(secret).context("decrypted secret is not UTF-8")?;
                let pair = KeyPair::from_secret_key(&secret)
                    .map_err(|e| anyhow::anyhow!("stored key is unusable: {e}"))?;
                Ok(Some(pair))
            }
            None => Ok(None),
        }
    }

    fn list_accounts(&self, namespace: &str) -> Result<Vec<String>> {
        let records = self.records.read();
        let mut accounts: Vec<String> = records
            .keys()
            .filter(|(ns, _)| ns == namespace)
            .map(|(_, account)| account.clone())
            .collect();
        accounts.sort();
        Ok(accounts)
    }
}

// ---------------------------------------------------------------------------
// Encryption helpers
// ---------------------------------------------------------------------------

/// Derive a 256-bit AES key from a password using Argon2id.
///
/// Uses a fixed salt for deterministic derivation (the same password always
/// produces the same key). Parameters: m=19456 KiB (~19 MB), t=2, p=1.
fn derive_key_from_password(password: &str) -> [u8; 32] {
    use argon2::{Algorithm, Argon2, Params, Version};

    let salt = b"lantern-keystore-v1";
    let params = Params::new(19_456, 2, 1, Some(32)).expect("valid argon2 params");
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let mut key = [0u8; 32];
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut key)
        .expect("argon2 key derivation");
    key
}

/// Encrypt `plaintext` with AES-256-GCM; returns `nonce || ciphertext`.
fn encrypt_secret(plaintext: &[u8], password: &str) -> Result<Vec<u8>> {
    let key_bytes = derive_key_from_password(password);
    let key = Key::<Aes256Gcm>::from_slice(&key_bytes);
    let cipher = Aes256Gcm::new(key);

    let nonce_bytes: [u8; AES_NONCE_LEN] = rand::random();
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| anyhow::anyhow!("encryption failed: {e}"))?;

    let mut result = nonce_bytes.to_vec();
    result.extend_from_slice(&ciphertext);
    Ok(result)
}

/// Decrypt data produced by [`encrypt_secret`].
fn decrypt_secret(ciphertext: &[u8], password: &str) -> Result<Vec<u8>> {
    if ciphertext.len() < AES_NONCE_LEN {
        anyhow::bail!("ciphertext too short (expected at least {AES_NONCE_LEN} bytes for nonce)");
    }

    let (nonce_bytes, encrypted) = ciphertext.split_at(AES_NONCE_LEN);
    let nonce = Nonce::from_slice(nonce_bytes);

    let key_bytes = derive_key_from_password(password);
    let key = Key::<Aes256Gcm>::from_slice(&key_bytes);
    let cipher = Aes256Gcm::new(key);

    let plaintext = cipher
        .decrypt(nonce, encrypted)
        .map_err(|e| anyhow::anyhow!("decryption failed: {e}"))?;

    Ok(plaintext)
}

/// Namespace for session-scoped keys: `<chain_id>:<topic>`.
pub fn session_namespace(chain_id: &str, topic: &str) -> String {
    format!("{chain_id}:{topic}")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
