//! Sealing and opening structured content under a session key
//!
//! `seal` serializes content with the codec, encrypts it under a fresh nonce
//! and returns the `(iv, cipherText)` pair carried by `encrypted` messages.
//! `open` reverses it and refuses to return anything unless the tag verifies.
//!
//! Error objects embedded in sealed content are reduced to `code` and
//! `message` before encryption; stacks, data and nested causes never leave
//! the process.

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::session_key::{CipherError, SessionKey};
use crate::codec::{self, CodecError, ErrorObject, HexBytes};
use crate::message::{EncryptedContent, RpcRequest, RpcResponse, RpcResult};

/// Authentication failure while opening an envelope
///
/// Fatal for the current exchange: retrying with the same inputs cannot
/// succeed.
#[derive(Debug, thiserror::Error)]
#[error("decryption failed: {0}")]
pub struct DecryptionError(#[from] pub CipherError);

/// Errors that can occur while sealing or opening content
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error(transparent)]
    Decryption(#[from] DecryptionError),
    #[error("encryption failed: {0}")]
    Encryption(CipherError),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("sealed payload is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Content that can be sealed into an envelope
pub trait Sealable: Serialize + DeserializeOwned {
    /// The value as it may cross the trust boundary
    fn redacted(&self) -> Self;
}

impl Sealable for RpcRequest {
    fn redacted(&self) -> Self {
        self.clone()
    }
}

impl Sealable for RpcResponse {
    fn redacted(&self) -> Self {
        let result = match &self.result {
            RpcResult::Error(error) => RpcResult::Error(error.redacted()),
            value => value.clone(),
        };
        RpcResponse {
            result,
            data: self.data.clone(),
        }
    }
}

impl Sealable for ErrorObject {
    fn redacted(&self) -> Self {
        ErrorObject::redacted(self)
    }
}

impl Sealable for serde_json::Value {
    fn redacted(&self) -> Self {
        self.clone()
    }
}

/// Encrypt `content` under `key`
pub fn seal<T: Sealable>(key: &SessionKey, content: &T) -> Result<EncryptedContent, EnvelopeError> {
    let plaintext = codec::serialize(&content.redacted())?;
    let (nonce, ciphertext) = key
        .encrypt(plaintext.as_bytes())
        .map_err(EnvelopeError::Encryption)?;

    Ok(EncryptedContent {
        iv: HexBytes::from(&nonce[..]),
        cipher_text: HexBytes::from(ciphertext),
    })
}

/// Decrypt and parse `encrypted` with `key`
///
/// # Errors
///
/// Returns [`EnvelopeError::Decryption`] if authentication fails (wrong key,
/// tampered nonce or ciphertext), and [`EnvelopeError::Codec`] if the
/// plaintext does not parse as `T`.
pub fn open<T: DeserializeOwned>(
    key: &SessionKey,
    encrypted: &EncryptedContent,
) -> Result<T, EnvelopeError> {
    let plaintext = key
        .decrypt(&encrypted.iv, &encrypted.cipher_text)
        .map_err(DecryptionError::from)?;
    let text = String::from_utf8(plaintext)?;
    Ok(codec::deserialize(&text)?)
}
