//! Deterministic JSON codec for relay payloads
//!
//! Everything that crosses the relay is JSON: the outbound `message` query
//! parameter, the inbound callback parameter and the plaintext sealed inside
//! an envelope. Plain JSON has no notion of byte buffers or error objects, so
//! this module provides two building blocks that survive a round trip:
//!
//! - [`HexBytes`]: raw bytes encoded as a `0x`-prefixed lowercase hex string
//! - [`ErrorObject`]: a standardized error (`code`, `message`, optional `data`,
//!   `stack` and nested `cause`)
//!
//! Field order is fixed by the derived `Serialize` impls, so serializing the
//! same value twice produces identical text.

use std::fmt;
use std::ops::Deref;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Errors that can occur while encoding or decoding relay payloads
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("empty payload")]
    Empty,
}

/// Serialize a value into its canonical JSON text
pub fn serialize<T>(value: &T) -> Result<String, CodecError>
where
    T: Serialize + ?Sized,
{
    Ok(serde_json::to_string(value)?)
}

/// Parse JSON text produced by [`serialize`] (or by the remote relay)
///
/// # Errors
///
/// Returns [`CodecError`] if the text is empty, truncated, or does not match
/// the shape of `T`.
pub fn deserialize<T>(text: &str) -> Result<T, CodecError>
where
    T: DeserializeOwned,
{
    if text.trim().is_empty() {
        return Err(CodecError::Empty);
    }
    Ok(serde_json::from_str(text)?)
}

/// Raw bytes that serialize as a `0x`-prefixed hex string
///
/// Decoding accepts prefixed or plain hex, and falls back to a JSON array of
/// byte values for peers that serialize buffers as sequences.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct HexBytes(Vec<u8>);

impl HexBytes {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.0))
    }

    pub fn from_hex(value: &str) -> Result<Self, hex::FromHexError> {
        let value = value.strip_prefix("0x").unwrap_or(value);
        Ok(Self(hex::decode(value)?))
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }
}

impl Deref for HexBytes {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<[u8]> for HexBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for HexBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for HexBytes {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl fmt::Debug for HexBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HexBytes({})", self.to_hex())
    }
}

impl Serialize for HexBytes {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for HexBytes {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{Error, SeqAccess, Visitor};

        struct HexBytesVisitor;

        impl<'de> Visitor<'de> for HexBytesVisitor {
            type Value = HexBytes;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a hex string or a sequence of bytes")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: Error,
            {
                HexBytes::from_hex(v).map_err(|e| E::custom(format!("invalid hex: {}", e)))
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut bytes = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(byte) = seq.next_element::<u8>()? {
                    bytes.push(byte);
                }
                Ok(HexBytes(bytes))
            }
        }

        deserializer.deserialize_any(HexBytesVisitor)
    }
}

/// A standardized error object embedded in plain data
///
/// Used for `failure` message content and for the error arm of RPC
/// responses. `stack` and `data` are local diagnostics; [`ErrorObject::redacted`]
/// strips them (and any nested cause) before the object crosses a trust
/// boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorObject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<ErrorObject>>,
}

impl ErrorObject {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
            data: None,
            stack: None,
            cause: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn with_cause(mut self, cause: ErrorObject) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Keep only `code` (if present) and `message`
    pub fn redacted(&self) -> Self {
        Self {
            code: self.code,
            message: self.message.clone(),
            data: None,
            stack: None,
            cause: None,
        }
    }
}

impl fmt::Display for ErrorObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} (code {})", self.message, code),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ErrorObject {}

/// The `{"data": ...}` wrapper the relay expects around an outbound message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayFrame<T> {
    pub data: T,
}
