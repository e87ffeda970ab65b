//! Symmetric session key using AES-256-GCM
//!
//! A `SessionKey` is derived once per signer session from the ECDH handshake
//! and owned by that session alone. It is never serialized, and its bytes are
//! zeroized when it is dropped.

use std::fmt;

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use rand::RngCore;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of an AES-GCM nonce in bytes (96 bits)
pub const NONCE_SIZE: usize = 12;
/// Size of the session key in bytes (256 bits)
pub const SESSION_KEY_SIZE: usize = 32;
/// Size of the AES-GCM authentication tag appended to every ciphertext
pub const TAG_SIZE: usize = 16;

/// Errors raised by the raw AEAD operations
#[derive(Debug, thiserror::Error)]
pub enum CipherError {
    #[error("encryption failed")]
    Encrypt,
    #[error("authentication failed")]
    Authentication,
    #[error("invalid nonce size, expected {expected}, got {actual}")]
    NonceSize { expected: usize, actual: usize },
    #[error("nonce was already used under this key")]
    ReplayedNonce,
}

/// A 256-bit AES-GCM key shared by the two ends of a signer session
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; SESSION_KEY_SIZE]);

impl PartialEq for SessionKey {
    fn eq(&self, other: &Self) -> bool {
        self.0[..].ct_eq(&other.0[..]).into()
    }
}

impl Eq for SessionKey {}

impl From<[u8; SESSION_KEY_SIZE]> for SessionKey {
    fn from(bytes: [u8; SESSION_KEY_SIZE]) -> Self {
        SessionKey(bytes)
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKey(..)")
    }
}

impl SessionKey {
    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.0))
    }

    /// Encrypt `plaintext` under a fresh random nonce
    ///
    /// The nonce is drawn from the thread-local CSPRNG on every call and is
    /// never derived from a counter, so two encryptions of the same plaintext
    /// produce different nonces and ciphertexts.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<([u8; NONCE_SIZE], Vec<u8>), CipherError> {
        let mut nonce = [0u8; NONCE_SIZE];
        rand::rng().fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher()
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| CipherError::Encrypt)?;

        Ok((nonce, ciphertext))
    }

    /// Decrypt and authenticate `ciphertext`
    ///
    /// # Errors
    ///
    /// Returns an error if the nonce has the wrong size, or if the tag does not
    /// verify (wrong key, corrupted nonce or ciphertext).
    pub fn decrypt(&self, nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CipherError> {
        if nonce.len() != NONCE_SIZE {
            return Err(CipherError::NonceSize {
                expected: NONCE_SIZE,
                actual: nonce.len(),
            });
        }

        self.cipher()
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CipherError::Authentication)
    }
}
