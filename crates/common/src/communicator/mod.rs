//! Out-of-band request delivery through an external interactive session
//!
//! The only channel to the relay is a url handed to an [`ExternalSession`]
//! and the callback url it redirects to when done. A [`Communicator`] runs
//! one such round trip at a time:
//!
//! ```text
//! Idle -> AwaitingExternalSession -> Resolved | Rejected | TimedOut
//! ```
//!
//! `send` only moves messages. `post_request_and_wait_for_response` also
//! correlates the response to its request and rejects duplicates, stray
//! responses and content the current exchange does not allow.

mod relay;
mod session;

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use parking_lot::Mutex;
use url::Url;

use crate::codec::CodecError;
use crate::message::{validate_response, Exchange, Message, MessageId, ProtocolViolation};

pub use self::relay::{
    build_callback_url, build_request_url, parse_callback_url, parse_request_url, RelayUrlError,
    CALLBACK_PARAM, MESSAGE_PARAM,
};
pub use self::session::{AuthSessionResult, ExternalSession};

/// Deadline applied to each external session unless configured otherwise
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(300);

/// Finished requests and seen responses remembered for duplicate detection
///
/// Older ids are forgotten. A late response to a forgotten request still
/// fails correlation, since only the in-flight request can be answered.
pub const HISTORY_LIMIT: usize = 256;

#[derive(Debug, Clone)]
pub struct CommunicatorConfig {
    /// Base url of the relay; the message is appended as a query parameter
    pub relay_url: Url,
    /// Where the external session redirects back to
    pub callback_url: Url,
    /// `None` waits for the external session indefinitely
    pub timeout: Option<Duration>,
}

impl CommunicatorConfig {
    pub fn new(relay_url: Url, callback_url: Url) -> Self {
        Self {
            relay_url,
            callback_url,
            timeout: Some(DEFAULT_SESSION_TIMEOUT),
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CommunicatorError {
    #[error("another request is already awaiting the external session")]
    Busy,
    #[error("user rejected the request")]
    UserRejected,
    #[error("external session did not return within {0:?}")]
    TimedOut(Duration),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),
    #[error("external session failed: {0}")]
    Session(anyhow::Error),
}

/// Where a single request is in its round trip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    AwaitingExternalSession,
    Resolved,
    Rejected,
    TimedOut,
}

impl RequestState {
    fn from_outcome(outcome: &Result<Message, CommunicatorError>) -> Self {
        match outcome {
            Ok(_) => RequestState::Resolved,
            Err(CommunicatorError::TimedOut(_)) => RequestState::TimedOut,
            Err(_) => RequestState::Rejected,
        }
    }
}

/// Whether the communicator currently has a request out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommunicatorState {
    Idle,
    AwaitingExternalSession(MessageId),
}

#[derive(Debug, Default)]
struct Inner {
    in_flight: Option<MessageId>,
    requests: HashMap<MessageId, RequestState>,
    answered: HashSet<MessageId>,
    seen_responses: HashSet<MessageId>,
    /// Finished request ids, oldest first
    finished: VecDeque<MessageId>,
    /// Seen response ids, oldest first
    responses: VecDeque<MessageId>,
}

impl Inner {
    fn finish(&mut self, id: MessageId, state: RequestState) {
        self.in_flight = None;
        self.requests.insert(id, state);
        self.finished.push_back(id);
        while self.finished.len() > HISTORY_LIMIT {
            if let Some(oldest) = self.finished.pop_front() {
                self.requests.remove(&oldest);
                self.answered.remove(&oldest);
            }
        }
    }

    /// Record a response id; false if it was already seen
    fn see_response(&mut self, id: MessageId) -> bool {
        if !self.seen_responses.insert(id) {
            return false;
        }
        self.responses.push_back(id);
        while self.responses.len() > HISTORY_LIMIT {
            if let Some(oldest) = self.responses.pop_front() {
                self.seen_responses.remove(&oldest);
            }
        }
        true
    }
}

/// Clears the in-flight slot when the send future completes or is dropped
struct InFlight<'a> {
    inner: &'a Mutex<Inner>,
    id: MessageId,
    state: RequestState,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        // a dropped future never saw its session end
        let state = match self.state {
            RequestState::AwaitingExternalSession => RequestState::Rejected,
            state => state,
        };
        self.inner.lock().finish(self.id, state);
    }
}

/// Delivers messages to the relay through an [`ExternalSession`]
#[derive(Debug)]
pub struct Communicator<E> {
    config: CommunicatorConfig,
    session: E,
    inner: Mutex<Inner>,
}

impl<E> Communicator<E>
where
    E: ExternalSession,
{
    pub fn new(config: CommunicatorConfig, session: E) -> Self {
        Self {
            config,
            session,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn config(&self) -> &CommunicatorConfig {
        &self.config
    }

    pub fn external_session(&self) -> &E {
        &self.session
    }

    pub fn state(&self) -> CommunicatorState {
        match self.inner.lock().in_flight {
            Some(id) => CommunicatorState::AwaitingExternalSession(id),
            None => CommunicatorState::Idle,
        }
    }

    /// The last known state of the request with `id`, if it was ever sent
    pub fn request_state(&self, id: &MessageId) -> Option<RequestState> {
        self.inner.lock().requests.get(id).copied()
    }

    /// Hand `request` to the external session and wait for whatever comes back
    ///
    /// Fails with [`CommunicatorError::Busy`] while another request is
    /// outstanding. The returned message is not validated against `request`.
    pub async fn send(&self, request: &Message) -> Result<Message, CommunicatorError> {
        let mut guard = self.begin(request)?;
        let outcome = self.deliver(request).await;
        guard.state = RequestState::from_outcome(&outcome);

        match &outcome {
            Ok(response) => tracing::debug!(
                request = %request.id,
                response = %response.id,
                "external session resolved"
            ),
            Err(e) => tracing::debug!(request = %request.id, "external session failed: {}", e),
        }
        outcome
    }

    /// Send `request` and accept only a response that answers it
    ///
    /// The response must carry `request.id` as its correlation id, must not
    /// have been seen before, and must have a content shape `exchange` allows.
    pub async fn post_request_and_wait_for_response(
        &self,
        request: &Message,
        exchange: Exchange,
    ) -> Result<Message, CommunicatorError> {
        let response = self.send(request).await?;

        let mut inner = self.inner.lock();
        let checked = Self::check_response(&mut inner, request, exchange, &response);
        if let Err(violation) = &checked {
            tracing::warn!(
                request = %request.id,
                response = %response.id,
                "discarding response: {}",
                violation
            );
            inner.requests.insert(request.id, RequestState::Rejected);
        }
        checked?;

        inner.answered.insert(request.id);
        Ok(response)
    }

    fn check_response(
        inner: &mut Inner,
        request: &Message,
        exchange: Exchange,
        response: &Message,
    ) -> Result<(), ProtocolViolation> {
        if !inner.see_response(response.id) {
            return Err(ProtocolViolation::DuplicateResponse(response.id));
        }
        if let Some(correlation_id) = response.correlation_id {
            if inner.answered.contains(&correlation_id) {
                return Err(ProtocolViolation::AlreadyAnswered(correlation_id));
            }
        }
        validate_response(&request.id, exchange, response)
    }

    fn begin(&self, request: &Message) -> Result<InFlight<'_>, CommunicatorError> {
        let mut inner = self.inner.lock();
        if let Some(active) = inner.in_flight {
            tracing::warn!(
                request = %request.id,
                active = %active,
                "refusing send while another request is outstanding"
            );
            return Err(CommunicatorError::Busy);
        }
        if inner.requests.contains_key(&request.id) {
            return Err(ProtocolViolation::DuplicateRequest(request.id).into());
        }

        inner.in_flight = Some(request.id);
        inner
            .requests
            .insert(request.id, RequestState::AwaitingExternalSession);
        tracing::debug!(request = %request.id, kind = request.content.kind(), "awaiting external session");

        Ok(InFlight {
            inner: &self.inner,
            id: request.id,
            state: RequestState::AwaitingExternalSession,
        })
    }

    async fn deliver(&self, request: &Message) -> Result<Message, CommunicatorError> {
        let url = build_request_url(&self.config.relay_url, &self.config.callback_url, request)?;
        let open = self.session.open(url, &self.config.callback_url);

        let result = match self.config.timeout {
            Some(limit) => tokio::time::timeout(limit, open)
                .await
                .map_err(|_| CommunicatorError::TimedOut(limit))?,
            None => open.await,
        }
        .map_err(CommunicatorError::Session)?;

        match result {
            AuthSessionResult::Success { url } => match parse_callback_url(&url) {
                Some(parsed) => Ok(parsed?),
                None => Err(CommunicatorError::UserRejected),
            },
            AuthSessionResult::Cancel | AuthSessionResult::Dismiss => {
                Err(CommunicatorError::UserRejected)
            }
            AuthSessionResult::Locked => Err(CommunicatorError::Busy),
        }
    }
}

#[cfg(test)]
mod test {
    use std::collections::VecDeque;
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::codec::ErrorObject;
    use crate::message::{ConfigContent, Content, Preference, SignerType};

    /// Answers each open with the next scripted reply
    #[derive(Default)]
    struct Scripted {
        replies: Mutex<VecDeque<Reply>>,
        opened: Mutex<Vec<Url>>,
    }

    enum Reply {
        Answer(Box<dyn Fn(&Message) -> Message + Send>),
        Raw(AuthSessionResult),
        Hang,
    }

    impl Scripted {
        fn push(&self, reply: Reply) {
            self.replies.lock().push_back(reply);
        }
    }

    #[async_trait]
    impl ExternalSession for Scripted {
        async fn open(&self, url: Url, callback_url: &Url) -> anyhow::Result<AuthSessionResult> {
            self.opened.lock().push(url.clone());
            let reply = self.replies.lock().pop_front();
            match reply {
                Some(Reply::Answer(answer)) => {
                    let (request, _) = parse_request_url(&url)?;
                    let redirect = build_callback_url(callback_url, &answer(&request))?;
                    Ok(AuthSessionResult::Success { url: redirect })
                }
                Some(Reply::Raw(result)) => Ok(result),
                Some(Reply::Hang) => std::future::pending().await,
                None => anyhow::bail!("no scripted reply"),
            }
        }
    }

    fn config() -> CommunicatorConfig {
        CommunicatorConfig::new(
            Url::parse("https://relay.test/connect").unwrap(),
            Url::parse("app://callback").unwrap(),
        )
    }

    fn negotiation() -> Message {
        Message::new(Content::Config(ConfigContent::select_signer_type(
            &Preference::default(),
        )))
    }

    fn scw_answer() -> Reply {
        Reply::Answer(Box::new(|request: &Message| {
            Message::new(Content::Config(ConfigContent::signer_type_answer(
                SignerType::Scw,
            )))
            .in_reply_to(&request.id)
        }))
    }

    #[tokio::test]
    async fn test_post_request_resolves() {
        let session = Arc::new(Scripted::default());
        session.push(scw_answer());
        let communicator = Communicator::new(config(), session.clone());

        let request = negotiation();
        let response = communicator
            .post_request_and_wait_for_response(&request, Exchange::Negotiation)
            .await
            .unwrap();

        assert_eq!(response.correlation_id, Some(request.id));
        assert_eq!(
            communicator.request_state(&request.id),
            Some(RequestState::Resolved)
        );
        assert_eq!(communicator.state(), CommunicatorState::Idle);

        let opened = session.opened.lock();
        assert_eq!(opened.len(), 1);
        assert!(opened[0].as_str().starts_with("https://relay.test/connect?"));
    }

    #[tokio::test]
    async fn test_cancel_and_dismiss_are_user_rejected() {
        let session = Arc::new(Scripted::default());
        session.push(Reply::Raw(AuthSessionResult::Cancel));
        session.push(Reply::Raw(AuthSessionResult::Dismiss));
        let communicator = Communicator::new(config(), session);

        for _ in 0..2 {
            let request = negotiation();
            let result = communicator.send(&request).await;
            assert!(matches!(result, Err(CommunicatorError::UserRejected)));
            assert_eq!(
                communicator.request_state(&request.id),
                Some(RequestState::Rejected)
            );
        }
    }

    #[tokio::test]
    async fn test_success_without_message_is_user_rejected() {
        let session = Arc::new(Scripted::default());
        session.push(Reply::Raw(AuthSessionResult::Success {
            url: Url::parse("app://callback?closed=1").unwrap(),
        }));
        let communicator = Communicator::new(config(), session);

        let result = communicator.send(&negotiation()).await;
        assert!(matches!(result, Err(CommunicatorError::UserRejected)));
    }

    #[tokio::test]
    async fn test_locked_session_is_busy() {
        let session = Arc::new(Scripted::default());
        session.push(Reply::Raw(AuthSessionResult::Locked));
        let communicator = Communicator::new(config(), session);

        let result = communicator.send(&negotiation()).await;
        assert!(matches!(result, Err(CommunicatorError::Busy)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout() {
        let session = Arc::new(Scripted::default());
        session.push(Reply::Hang);
        let communicator = Communicator::new(
            config().with_timeout(Some(Duration::from_secs(5))),
            session,
        );

        let request = negotiation();
        let result = communicator.send(&request).await;
        assert!(matches!(result, Err(CommunicatorError::TimedOut(_))));
        assert_eq!(
            communicator.request_state(&request.id),
            Some(RequestState::TimedOut)
        );
        assert_eq!(communicator.state(), CommunicatorState::Idle);
    }

    #[tokio::test]
    async fn test_concurrent_send_is_busy() {
        let session = Arc::new(Scripted::default());
        session.push(Reply::Hang);
        let communicator = Arc::new(Communicator::new(config().with_timeout(None), session));

        let first = negotiation();
        let pending = {
            let communicator = communicator.clone();
            let first = first.clone();
            tokio::spawn(async move { communicator.send(&first).await })
        };
        while communicator.state() == CommunicatorState::Idle {
            tokio::task::yield_now().await;
        }
        assert_eq!(
            communicator.state(),
            CommunicatorState::AwaitingExternalSession(first.id)
        );

        let second = communicator.send(&negotiation()).await;
        assert!(matches!(second, Err(CommunicatorError::Busy)));

        pending.abort();
        let _ = pending.await;
        assert_eq!(communicator.state(), CommunicatorState::Idle);
        assert_eq!(
            communicator.request_state(&first.id),
            Some(RequestState::Rejected)
        );
    }

    #[tokio::test]
    async fn test_mismatched_correlation_is_violation() {
        let session = Arc::new(Scripted::default());
        session.push(Reply::Answer(Box::new(|_: &Message| {
            Message::new(Content::Config(ConfigContent::signer_type_answer(
                SignerType::Scw,
            )))
            .in_reply_to(&MessageId::new())
        })));
        let communicator = Communicator::new(config(), session);

        let request = negotiation();
        let result = communicator
            .post_request_and_wait_for_response(&request, Exchange::Negotiation)
            .await;
        assert!(matches!(
            result,
            Err(CommunicatorError::Protocol(
                ProtocolViolation::CorrelationMismatch { .. }
            ))
        ));
        assert_eq!(
            communicator.request_state(&request.id),
            Some(RequestState::Rejected)
        );
    }

    #[tokio::test]
    async fn test_replayed_response_is_violation() {
        let replayed: Arc<Mutex<Option<Message>>> = Arc::default();
        let session = Arc::new(Scripted::default());
        {
            let replayed = replayed.clone();
            session.push(Reply::Answer(Box::new(move |request: &Message| {
                let response = Message::new(Content::Failure(ErrorObject::new(4001, "no")))
                    .in_reply_to(&request.id);
                *replayed.lock() = Some(response.clone());
                response
            })));
        }
        {
            let replayed = replayed.clone();
            session.push(Reply::Answer(Box::new(move |_: &Message| {
                replayed.lock().clone().unwrap()
            })));
        }
        let communicator = Communicator::new(config(), session);

        let first = Message::new(Content::Failure(ErrorObject::new(0, "stray")));
        communicator
            .post_request_and_wait_for_response(&first, Exchange::Session)
            .await
            .unwrap();

        let second = Message::new(Content::Failure(ErrorObject::new(0, "stray")));
        let result = communicator
            .post_request_and_wait_for_response(&second, Exchange::Session)
            .await;
        assert!(matches!(
            result,
            Err(CommunicatorError::Protocol(
                ProtocolViolation::DuplicateResponse(_)
            ))
        ));
    }

    #[tokio::test]
    async fn test_reused_request_id_is_violation() {
        let session = Arc::new(Scripted::default());
        session.push(scw_answer());
        let communicator = Communicator::new(config(), session);

        let request = negotiation();
        communicator
            .post_request_and_wait_for_response(&request, Exchange::Negotiation)
            .await
            .unwrap();

        let result = communicator.send(&request).await;
        assert!(matches!(
            result,
            Err(CommunicatorError::Protocol(
                ProtocolViolation::DuplicateRequest(_)
            ))
        ));
    }

    #[tokio::test]
    async fn test_session_error_propagates() {
        let session = Arc::new(Scripted::default());
        let communicator = Communicator::new(config(), session);

        let result = communicator.send(&negotiation()).await;
        assert!(matches!(result, Err(CommunicatorError::Session(_))));
    }

    #[test]
    fn test_history_is_bounded() {
        let mut inner = Inner::default();
        let ids: Vec<MessageId> = (0..HISTORY_LIMIT + 8).map(|_| MessageId::new()).collect();
        for id in &ids {
            inner.in_flight = Some(*id);
            inner.finish(*id, RequestState::Resolved);
            inner.answered.insert(*id);
        }

        assert_eq!(inner.in_flight, None);
        assert_eq!(inner.requests.len(), HISTORY_LIMIT);
        assert_eq!(inner.answered.len(), HISTORY_LIMIT);
        assert!(!inner.requests.contains_key(&ids[0]));
        assert!(!inner.answered.contains(&ids[0]));
        assert_eq!(
            inner.requests.get(&ids[HISTORY_LIMIT + 7]),
            Some(&RequestState::Resolved)
        );
    }

    #[test]
    fn test_seen_responses_are_bounded() {
        let mut inner = Inner::default();
        let first = MessageId::new();
        assert!(inner.see_response(first));
        assert!(!inner.see_response(first));

        for _ in 0..HISTORY_LIMIT {
            assert!(inner.see_response(MessageId::new()));
        }
        assert_eq!(inner.seen_responses.len(), HISTORY_LIMIT);
        assert!(!inner.seen_responses.contains(&first));
    }
}
