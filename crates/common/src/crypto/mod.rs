//! Cryptographic primitives for the signer session
//!
//! - **Key exchange**: ephemeral P-256 keypairs, generated per session; the
//!   public half travels in the handshake as hex SPKI DER
//! - **Session key**: ECDH shared secret used directly as an AES-256-GCM key
//! - **Envelope**: codec + AEAD sealing of structured content with a fresh
//!   96-bit nonce per message
//!
//! # Session Protocol
//!
//! 1. The app generates a [`KeyPair`] and sends its public key in the clear
//! 2. The remote signer answers with its own public key
//! 3. Both sides call [`KeyPair::derive`] and obtain the same [`SessionKey`]
//! 4. Every later payload is [`seal`]ed / [`open`]ed under that key
//!
//! Neither the keypair nor the session key is ever persisted.

mod envelope;
mod keys;
mod session_key;

pub use envelope::{open, seal, DecryptionError, EnvelopeError, Sealable};
pub use keys::{KeyAgreementError, KeyPair, PublicKey};
pub use session_key::{CipherError, SessionKey, NONCE_SIZE, SESSION_KEY_SIZE, TAG_SIZE};
