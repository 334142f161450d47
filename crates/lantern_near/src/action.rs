//! Incoming request types and the action translator.
//!
//! Requests arrive as JSON with chain-agnostic action descriptors; this
//! module deserializes them into a closed tagged type at the boundary and
//! translates them into wire actions. Unknown action tags are rejected by
//! serde, so nothing untyped survives past deserialization.
//!
//! `gas`, `deposit` and `allowance` are accepted as decimal strings (NEAR's
//! JSON convention) or plain integers, and carried as `u64`/`u128`; these
//! values routinely exceed the 53-bit range, so they are never floats.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::WalletError;
use crate::key::KeyError;
use crate::wire;

/// A transaction signing request: who signs, who receives, what happens.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub signer_id: String,
    pub receiver_id: String,
    pub actions: Vec<ActionDescriptor>,
}

/// A chain-agnostic action descriptor, `{"type": ..., "params": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "params")]
pub enum ActionDescriptor {
    #[serde(rename_all = "camelCase")]
    FunctionCall {
        method_name: String,
        /// Call arguments: a JSON object/array serialized verbatim, or a
        /// base64 string for raw byte payloads.
        #[serde(default)]
        args: Value,
        #[serde(with = "dec_u64")]
        gas: u64,
        #[serde(with = "dec_u128")]
        deposit: u128,
    },
    #[serde(rename_all = "camelCase")]
    AddKey {
        public_key: String,
        access_key: AccessKeyDescriptor,
    },
    #[serde(rename_all = "camelCase")]
    DeleteKey { public_key: String },
}

/// The `accessKey` payload of an `AddKey` action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessKeyDescriptor {
    pub permission: PermissionDescriptor,
}

/// A requested key permission: the `"FullAccess"` literal, or a scoped
/// function-call grant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PermissionDescriptor {
    #[serde(rename_all = "camelCase")]
    FunctionCall {
        receiver_id: String,
        /// Empty means "all methods on the receiver".
        #[serde(default)]
        method_names: Vec<String>,
        #[serde(default, with = "dec_u128_opt")]
        allowance: Option<u128>,
    },
    Literal(String),
}

impl PermissionDescriptor {
    /// Scoped function-call permission without an allowance.
    pub fn function_call(receiver_id: impl Into<String>, method_names: Vec<String>) -> Self {
        PermissionDescriptor::FunctionCall {
            receiver_id: receiver_id.into(),
            method_names,
            allowance: None,
        }
    }
}

impl ActionDescriptor {
    pub fn function_call(
        method_name: impl Into<String>,
        args: Value,
        gas: u64,
        deposit: u128,
    ) -> Self {
        ActionDescriptor::FunctionCall {
            method_name: method_name.into(),
            args,
            gas,
            deposit,
        }
    }

    pub fn add_key(public_key: impl Into<String>, permission: PermissionDescriptor) -> Self {
        ActionDescriptor::AddKey {
            public_key: public_key.into(),
            access_key: AccessKeyDescriptor { permission },
        }
    }

    pub fn delete_key(public_key: impl Into<String>) -> Self {
        ActionDescriptor::DeleteKey {
            public_key: public_key.into(),
        }
    }
}

/// Translate request descriptors into wire actions.
///
/// Total over the three supported kinds; order is preserved since actions
/// execute in sequence on-chain.
pub fn translate_actions(actions: &[ActionDescriptor]) -> Result<Vec<wire::Action>, WalletError> {
    actions.iter().map(translate_action).collect()
}

fn translate_action(action: &ActionDescriptor) -> Result<wire::Action, WalletError> {
    match action {
        ActionDescriptor::FunctionCall {
            method_name,
            args,
            gas,
            deposit,
        } => Ok(wire::Action::FunctionCall {
            method_name: method_name.clone(),
            args: encode_args(args)?,
            gas: *gas,
            deposit: *deposit,
        }),
        ActionDescriptor::AddKey {
            public_key,
            access_key,
        } => Ok(wire::Action::AddKey {
            public_key: parse_key(public_key)?,
            access_key: translate_permission(&access_key.permission)?,
        }),
        ActionDescriptor::DeleteKey { public_key } => Ok(wire::Action::DeleteKey {
            public_key: parse_key(public_key)?,
        }),
    }
}

fn translate_permission(permission: &PermissionDescriptor) -> Result<wire::AccessKey, WalletError> {
    match permission {
        PermissionDescriptor::Literal(s) if s == "FullAccess" => Ok(wire::AccessKey::full_access()),
        PermissionDescriptor::Literal(other) => Err(WalletError::InvalidAction(format!(
            "unknown permission literal: {other:?}"
        ))),
        PermissionDescriptor::FunctionCall {
            receiver_id,
            method_names,
            allowance,
        } => Ok(wire::AccessKey::function_call(
            receiver_id.clone(),
            method_names.clone(),
            *allowance,
        )),
    }
}

fn parse_key(s: &str) -> Result<wire::PublicKey, WalletError> {
    wire::PublicKey::parse(s).map_err(|e: KeyError| WalletError::InvalidAction(e.to_string()))
}

fn encode_args(args: &Value) -> Result<Vec<u8>, WalletError> {
    use base64::Engine;

    match args {
        Value::Null => Ok(Vec::new()),
        Value::String(s) => base64::engine::general_purpose::STANDARD
            .decode(s)
            .map_err(|_| WalletError::InvalidAction("args string is not valid base64".into())),
        other => Ok(serde_json::to_vec(other)?),
    }
}

// ---------------------------------------------------------------------------
// Decimal-string serde helpers
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(untagged)]
enum NumOrStr {
    Num(u64),
    Str(String),
}

pub(crate) mod dec_u64 {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::NumOrStr;

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        match NumOrStr::deserialize(deserializer)? {
            NumOrStr::Num(n) => Ok(n),
            NumOrStr::Str(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

pub(crate) mod dec_u128 {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::NumOrStr;

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        match NumOrStr::deserialize(deserializer)? {
            NumOrStr::Num(n) => Ok(n.into()),
            NumOrStr::Str(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

pub(crate) mod dec_u128_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::NumOrStr;

    pub fn serialize<S: Serializer>(
        value: &Option<u128>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_some(&v.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<u128>, D::Error> {
        match Option::<NumOrStr>::deserialize(deserializer)? {
            None => Ok(None),
            Some(NumOrStr::Num(n)) => Ok(Some(n.into())),
            Some(NumOrStr::Str(s)) => s.parse().map(Some).map_err(serde::de::Error::custom),
        }
    }
}
