use std::time::Duration;

use crate::codec::{CodecError, ErrorObject};
use crate::communicator::CommunicatorError;
use crate::crypto::{DecryptionError, EnvelopeError};
use crate::message::{error_codes, ProtocolViolation, SignerType, UnknownSignerType};
use crate::storage::StorageError;

/// Everything a signer session operation can fail with
#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    #[error("user rejected the request")]
    UserRejected,
    #[error("another request is already awaiting the external session")]
    Busy,
    #[error("external session did not return within {0:?}")]
    TimedOut(Duration),
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),
    #[error("signer type {0} is not supported")]
    UnsupportedSignerType(SignerType),
    #[error(transparent)]
    UnknownSignerType(#[from] UnknownSignerType),
    #[error("not connected, request accounts first")]
    NotConnected,
    #[error("invalid params: {0}")]
    InvalidParams(String),
    /// An error the remote signer reflected back
    #[error("{0}")]
    Rpc(ErrorObject),
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Decryption(#[from] DecryptionError),
    #[error("envelope error: {0}")]
    Envelope(EnvelopeError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("external session failed: {0}")]
    Session(anyhow::Error),
}

impl From<CommunicatorError> for SignerError {
    fn from(err: CommunicatorError) -> Self {
        match err {
            CommunicatorError::Busy => SignerError::Busy,
            CommunicatorError::UserRejected => SignerError::UserRejected,
            CommunicatorError::TimedOut(limit) => SignerError::TimedOut(limit),
            CommunicatorError::Codec(e) => SignerError::Codec(e),
            CommunicatorError::Protocol(e) => SignerError::Protocol(e),
            CommunicatorError::Session(e) => SignerError::Session(e),
        }
    }
}

impl From<EnvelopeError> for SignerError {
    fn from(err: EnvelopeError) -> Self {
        match err {
            EnvelopeError::Decryption(e) => SignerError::Decryption(e),
            EnvelopeError::Codec(e) => SignerError::Codec(e),
            other => SignerError::Envelope(other),
        }
    }
}

impl SignerError {
    /// EIP-1193 / JSON-RPC code for this failure
    pub fn code(&self) -> i64 {
        match self {
            SignerError::UserRejected => error_codes::USER_REJECTED,
            SignerError::NotConnected => error_codes::UNAUTHORIZED,
            SignerError::UnsupportedSignerType(_) => error_codes::UNSUPPORTED_METHOD,
            SignerError::InvalidParams(_) => error_codes::INVALID_PARAMS,
            SignerError::Codec(_) => error_codes::PARSE,
            SignerError::Rpc(error) => error.code.unwrap_or(error_codes::INTERNAL),
            SignerError::Busy
            | SignerError::TimedOut(_)
            | SignerError::HandshakeFailed(_)
            | SignerError::UnknownSignerType(_)
            | SignerError::Protocol(_)
            | SignerError::Decryption(_)
            | SignerError::Envelope(_)
            | SignerError::Storage(_)
            | SignerError::Session(_) => error_codes::INTERNAL,
        }
    }

    /// The standardized failure object handed to the connector layer
    pub fn to_error_object(&self) -> ErrorObject {
        match self {
            SignerError::Rpc(error) => error.clone(),
            other => ErrorObject::new(other.code(), other.to_string()),
        }
    }

    /// Failures after which the caller should offer the flow again
    pub fn is_user_rejection(&self) -> bool {
        match self {
            SignerError::UserRejected => true,
            SignerError::Rpc(error) => error.code == Some(error_codes::USER_REJECTED),
            _ => false,
        }
    }
}
