use std::fmt;

use p256::ecdh::diffie_hellman;
use p256::elliptic_curve::rand_core::OsRng;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::pkcs8::spki;
use p256::pkcs8::{DecodePublicKey, EncodePublicKey};
use serde::{Deserialize, Serialize};

use super::session_key::{SessionKey, SESSION_KEY_SIZE};

/// Size of an uncompressed SEC1 P-256 point (0x04 || x || y)
pub const UNCOMPRESSED_POINT_SIZE: usize = 65;
/// Size of a compressed SEC1 P-256 point (0x02/0x03 || x)
pub const COMPRESSED_POINT_SIZE: usize = 33;

/// Errors that can occur while importing or agreeing on keys
#[derive(Debug, thiserror::Error)]
pub enum KeyAgreementError {
    #[error("public key hex decode error: {0}")]
    Encoding(#[from] hex::FromHexError),
    #[error("public key is not on the P-256 curve (oid {0})")]
    CurveMismatch(String),
    #[error("malformed public key: {0}")]
    Malformed(String),
}

/// Public half of an ephemeral P-256 keypair
///
/// Travels over the relay as hex encoded SPKI DER, the same format WebCrypto
/// produces for `exportKey("spki", ...)`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(p256::PublicKey);

impl From<p256::PublicKey> for PublicKey {
    fn from(key: p256::PublicKey) -> Self {
        PublicKey(key)
    }
}

impl PublicKey {
    /// Canonical SPKI DER encoding of this key
    pub fn to_spki_der(&self) -> Vec<u8> {
        // Encoding a valid affine point into SPKI cannot fail
        self.0
            .to_public_key_der()
            .map(|doc| doc.as_bytes().to_vec())
            .unwrap_or_default()
    }

    /// Hex encoded SPKI DER, as carried in a message's `sender` field
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_spki_der())
    }

    /// Uncompressed SEC1 encoding of the point
    pub fn to_sec1_bytes(&self) -> Vec<u8> {
        self.0.to_encoded_point(false).as_bytes().to_vec()
    }

    /// Import a public key from SPKI DER, or a raw SEC1 point
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The SPKI names a curve other than P-256
    /// - The bytes do not describe a valid point on the curve
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyAgreementError> {
        if matches!(bytes.len(), UNCOMPRESSED_POINT_SIZE | COMPRESSED_POINT_SIZE)
            && matches!(bytes.first(), Some(0x02..=0x04))
        {
            return p256::PublicKey::from_sec1_bytes(bytes)
                .map(PublicKey)
                .map_err(|_| KeyAgreementError::Malformed("invalid SEC1 point".to_string()));
        }

        p256::PublicKey::from_public_key_der(bytes)
            .map(PublicKey)
            .map_err(|e| match e {
                spki::Error::OidUnknown { oid } => KeyAgreementError::CurveMismatch(oid.to_string()),
                other => KeyAgreementError::Malformed(other.to_string()),
            })
    }

    /// Parse a public key from a hexadecimal string
    ///
    /// Accepts both plain hex and "0x"-prefixed hex strings.
    pub fn from_hex(hex: &str) -> Result<Self, KeyAgreementError> {
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        let bytes = hex::decode(hex)?;
        Self::from_bytes(&bytes)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.to_sec1_bytes()))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for PublicKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let hex = String::deserialize(deserializer)?;
        PublicKey::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

/// Ephemeral P-256 keypair for a single signer session
///
/// The secret half never leaves the process: it is not serializable and is
/// zeroized when the keypair is dropped. Every call to [`KeyPair::generate`]
/// draws a fresh scalar from the OS RNG.
pub struct KeyPair {
    secret: p256::SecretKey,
    public: PublicKey,
}

impl KeyPair {
    /// Generate a new random keypair using a cryptographically secure RNG
    pub fn generate() -> Self {
        let secret = p256::SecretKey::random(&mut OsRng);
        let public = PublicKey(secret.public_key());
        Self { secret, public }
    }

    pub fn public(&self) -> PublicKey {
        self.public
    }

    /// Derive the symmetric session key shared with `peer`
    ///
    /// ECDH over P-256; the 32-byte x-coordinate of the shared point is the
    /// AES-256-GCM key. Both parties obtain the same key when each uses its
    /// own secret and the other's public key.
    pub fn derive(&self, peer: &PublicKey) -> SessionKey {
        let shared = diffie_hellman(self.secret.to_nonzero_scalar(), peer.0.as_affine());
        let mut bytes = [0u8; SESSION_KEY_SIZE];
        bytes.copy_from_slice(shared.raw_secret_bytes().as_slice());
        SessionKey::from(bytes)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}
