use std::fmt;

use super::{Content, Message, MessageId};

/// The kind of exchange a request belongs to
///
/// Each exchange only accepts a closed set of response shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exchange {
    /// Signer-type negotiation, before any key exists
    Negotiation,
    /// Public key exchange
    Handshake,
    /// Sealed RPC calls under an established session key
    Session,
}

impl Exchange {
    pub fn accepts(&self, content: &Content) -> bool {
        match self {
            Exchange::Negotiation => matches!(content, Content::Config(_)),
            Exchange::Handshake | Exchange::Session => {
                matches!(content, Content::Encrypted(_) | Content::Failure(_))
            }
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exchange::Negotiation => f.write_str("negotiation"),
            Exchange::Handshake => f.write_str("handshake"),
            Exchange::Session => f.write_str("session"),
        }
    }
}

/// A response that must not be processed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolViolation {
    #[error("response {response} carries no correlation id")]
    Uncorrelated { response: MessageId },
    #[error("response correlates to {actual}, but the outstanding request is {expected}")]
    CorrelationMismatch {
        expected: MessageId,
        actual: MessageId,
    },
    #[error("request id {0} was already used")]
    DuplicateRequest(MessageId),
    #[error("request {0} was already answered")]
    AlreadyAnswered(MessageId),
    #[error("response {0} was already received")]
    DuplicateResponse(MessageId),
    #[error("unexpected {content} content during {exchange}")]
    UnexpectedContent {
        exchange: Exchange,
        content: &'static str,
    },
}

/// Check that `response` answers `request_id` with a shape `exchange` allows
///
/// Bookkeeping of already answered requests is the communicator's job; this
/// only checks the message itself.
pub fn validate_response(
    request_id: &MessageId,
    exchange: Exchange,
    response: &Message,
) -> Result<(), ProtocolViolation> {
    let correlation_id = response
        .correlation_id
        .ok_or(ProtocolViolation::Uncorrelated {
            response: response.id,
        })?;

    if &correlation_id != request_id {
        return Err(ProtocolViolation::CorrelationMismatch {
            expected: *request_id,
            actual: correlation_id,
        });
    }

    if !exchange.accepts(&response.content) {
        return Err(ProtocolViolation::UnexpectedContent {
            exchange,
            content: response.content.kind(),
        });
    }

    Ok(())
}
