//! Wallet error types.

use crate::gateway::GatewayError;

/// Errors surfaced by the wallet core.
///
/// Validation errors (`InvalidChainId`, `UnauthorizedSigner`, `InvalidAction`)
/// are detected before any network call. `NoAuthorizedKey` is the resolver's
/// terminal outcome when no key validates a transaction; it is an error for
/// single-transaction signing but is caught per account during sign-in/out.
#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    /// The request carried a missing, malformed, or unconfigured chain id.
    #[error("Invalid chain id: {0}")]
    InvalidChainId(String),

    /// The request referenced a session topic the session store does not know.
    #[error("Unknown session topic: {0}")]
    UnknownSession(String),

    /// The transaction's signer is not among the session's authorized accounts.
    #[error("Signer {0} is not authorized for this session")]
    UnauthorizedSigner(String),

    /// No key available to the signer validates the transaction.
    #[error("No access key authorizes this transaction for {0}")]
    NoAuthorizedKey(String),

    /// An action descriptor could not be translated.
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    /// A gateway call exceeded its bounded timeout.
    #[error("Chain gateway timed out")]
    GatewayTimeout,

    /// Network or RPC error from the chain gateway.
    #[error("Chain gateway failure: {0}")]
    Gateway(GatewayError),

    /// Key store read or write failed.
    #[error("Key store error: {0}")]
    Keystore(String),

    /// Transaction or payload serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl WalletError {
    /// Stable machine-readable reason code, rendered alongside the free-text
    /// message in request rejections.
    pub fn reason_code(&self) -> &'static str {
        match self {
            WalletError::InvalidChainId(_) => "INVALID_CHAIN_ID",
            WalletError::UnknownSession(_) => "UNKNOWN_SESSION",
            WalletError::UnauthorizedSigner(_) => "UNAUTHORIZED_SIGNER",
            WalletError::NoAuthorizedKey(_) => "NO_AUTHORIZED_KEY",
            WalletError::InvalidAction(_) => "INVALID_ACTION",
            WalletError::GatewayTimeout => "GATEWAY_TIMEOUT",
            WalletError::Gateway(_) => "GATEWAY_FAILURE",
            WalletError::Keystore(_) => "KEYSTORE_FAILURE",
            WalletError::Serialization(_) => "SERIALIZATION_FAILURE",
        }
    }
}

impl From<GatewayError> for WalletError {
    fn from(err: GatewayError) -> Self {
        // Timeouts get their own kind so callers can distinguish a slow node
        // from a hard RPC failure.
        match err {
            GatewayError::Timeout => WalletError::GatewayTimeout,
            other => WalletError::Gateway(other),
        }
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(err: serde_json::Error) -> Self {
        WalletError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for WalletError {
    fn from(err: std::io::Error) -> Self {
        // borsh serialization reports through std::io::Error.
        WalletError::Serialization(err.to_string())
    }
}
