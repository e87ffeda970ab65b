//! Relay url encoding
//!
//! Outbound: `<relay>?message=<{"data": Message}>&callbackUrl=<callback>`
//! Inbound:  `<callback>?message=<Message>`

use url::Url;

use crate::codec::{self, CodecError, RelayFrame};
use crate::message::Message;

/// Query parameter carrying the serialized message, in both directions
pub const MESSAGE_PARAM: &str = "message";
/// Query parameter carrying the redirect target on outbound urls
pub const CALLBACK_PARAM: &str = "callbackUrl";

/// Errors that can occur while decoding a relay url
#[derive(Debug, thiserror::Error)]
pub enum RelayUrlError {
    #[error("missing query parameter: {0}")]
    MissingParam(&'static str),
    #[error("invalid callback url: {0}")]
    InvalidCallback(#[from] url::ParseError),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// Replace `name` params on `url` with a single `name=value`
fn set_query_param(url: &mut Url, name: &str, value: &str) {
    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != name)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut pairs = url.query_pairs_mut();
    pairs.clear();
    for (key, value) in &retained {
        pairs.append_pair(key, value);
    }
    pairs.append_pair(name, value);
}

/// Build the url that hands `message` to the relay
pub fn build_request_url(
    relay_url: &Url,
    callback_url: &Url,
    message: &Message,
) -> Result<Url, CodecError> {
    let payload = codec::serialize(&RelayFrame { data: message })?;

    let mut url = relay_url.clone();
    set_query_param(&mut url, MESSAGE_PARAM, &payload);
    set_query_param(&mut url, CALLBACK_PARAM, callback_url.as_str());
    Ok(url)
}

/// Decode an outbound url on the relay side
pub fn parse_request_url(url: &Url) -> Result<(Message, Url), RelayUrlError> {
    let payload =
        query_param(url, MESSAGE_PARAM).ok_or(RelayUrlError::MissingParam(MESSAGE_PARAM))?;
    let callback =
        query_param(url, CALLBACK_PARAM).ok_or(RelayUrlError::MissingParam(CALLBACK_PARAM))?;

    let frame: RelayFrame<Message> = codec::deserialize(&payload)?;
    Ok((frame.data, Url::parse(&callback)?))
}

/// Build the redirect the relay sends back with its response
pub fn build_callback_url(callback_url: &Url, message: &Message) -> Result<Url, CodecError> {
    let payload = codec::serialize(message)?;
    let mut url = callback_url.clone();
    set_query_param(&mut url, MESSAGE_PARAM, &payload);
    Ok(url)
}

/// Extract the response message from a callback redirect
///
/// Returns `None` when the redirect carries no `message` parameter, which the
/// communicator treats as a rejection.
pub fn parse_callback_url(url: &Url) -> Option<Result<Message, CodecError>> {
    query_param(url, MESSAGE_PARAM).map(|payload| codec::deserialize(&payload))
}
