/**
 * JSON codec shared by every layer.
 *  - Hex representation for byte buffers
 *  - Standardized error objects
 */
pub mod codec;
/**
 * Communicator: delivers one message at a time
 *  through an external interactive session and
 *  parses the callback it redirects to.
 */
pub mod communicator;
/**
 * Cryptographic types and operations.
 *  - Ephemeral P-256 keypairs and ECDH
 *  - AES-256-GCM session keys
 *  - Sealing / opening of structured content
 */
pub mod crypto;
/**
 * Relay message taxonomy, RPC payloads and
 *  response validation.
 */
pub mod message;
/**
 * Stateful signer session: signer selection,
 *  handshake and encrypted RPC routing.
 */
pub mod signer;
/**
 * Scoped key-value persistence for the signer
 *  choice that outlives a session.
 */
pub mod storage;
/**
 * In-process mock wallet for tests.
 */
pub mod testkit;

pub mod prelude {
    pub use crate::codec::{CodecError, ErrorObject};
    pub use crate::communicator::{
        AuthSessionResult, Communicator, CommunicatorConfig, CommunicatorError, ExternalSession,
    };
    pub use crate::crypto::{KeyPair, PublicKey, SessionKey};
    pub use crate::message::{AppMetadata, Preference, PreferenceOption, RequestArguments};
    pub use crate::signer::{SessionConfig, SessionEvent, SignerError, SignerSession};
    pub use crate::storage::{FileStore, KeyValueStore, MemoryStore};
}
