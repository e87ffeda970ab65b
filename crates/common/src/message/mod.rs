//! Message taxonomy for the relay protocol
//!
//! Every exchange with the remote signer is one request [`Message`] and one
//! response [`Message`]. A response names the request it answers through its
//! correlation id (`requestId` on the wire). The [`Content`] union is closed:
//!
//! - `handshake`: app metadata in the clear, sent before a key exists
//! - `encrypted`: a sealed `RpcRequest`/`RpcResponse`
//! - `config`: unencrypted negotiation (signer-type selection)
//! - `failure`: a standardized error object

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::codec::ErrorObject;
use crate::crypto::PublicKey;

mod content;
mod rpc;
mod validation;

pub use content::{
    AppMetadata, ConfigContent, ConfigEvent, EncryptedContent, HandshakeContent, HandshakeMethod,
    Preference, PreferenceOption, SignerType, UnknownSignerType,
};
pub use rpc::{error_codes, RequestArguments, ResponseData, RpcRequest, RpcResponse, RpcResult};
pub use validation::{validate_response, Exchange, ProtocolViolation};

/// Failure content is a plain error object
pub type FailureContent = ErrorObject;

/// Opaque unique message identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for MessageId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tagged union of everything a message can carry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Content {
    Handshake(HandshakeContent),
    Encrypted(EncryptedContent),
    Config(ConfigContent),
    Failure(FailureContent),
}

impl Content {
    pub fn kind(&self) -> &'static str {
        match self {
            Content::Handshake(_) => "handshake",
            Content::Encrypted(_) => "encrypted",
            Content::Config(_) => "config",
            Content::Failure(_) => "failure",
        }
    }
}

/// A single relay message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    /// Id of the request this message answers
    #[serde(
        default,
        rename = "requestId",
        alias = "correlationId",
        skip_serializing_if = "Option::is_none"
    )]
    pub correlation_id: Option<MessageId>,
    /// Hex encoded SPKI public key of the sending party
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    pub content: Content,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// A fresh message with a new id, timestamped now
    pub fn new(content: Content) -> Self {
        Self {
            id: MessageId::new(),
            correlation_id: None,
            sender: None,
            content,
            timestamp: Utc::now(),
        }
    }

    pub fn in_reply_to(mut self, request_id: &MessageId) -> Self {
        self.correlation_id = Some(*request_id);
        self
    }

    pub fn with_sender(mut self, sender: &PublicKey) -> Self {
        self.sender = Some(sender.to_hex());
        self
    }
}
