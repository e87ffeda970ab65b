//! The stateful signer session
//!
//! A [`SignerSession`] is what the connector layer talks to. It owns one
//! [`Communicator`] and, once connected, the session key shared with the
//! remote signer. Its lifecycle:
//!
//! 1. **Signer selection**: use the signer kind persisted last time, or ask
//!    the relay with a `selectSignerType` config request and persist the
//!    answer. Only `scw` can be driven over this protocol.
//! 2. **Handshake**: send our fresh public key and the app metadata in the
//!    clear; derive the session key from the public key the relay answers
//!    with and open the sealed account list it sends along.
//! 3. **Calls**: every other request is sealed under the session key, sent,
//!    and the sealed response opened. An envelope whose nonce was already
//!    used under the session key is refused. A few methods are answered
//!    locally.
//! 4. **Teardown**: `disconnect` drops all key material and clears the
//!    persisted signer kind.
//!
//! Relay round trips are serialized behind an async mutex, so concurrent
//! callers queue rather than collide on the communicator. Session state sits
//! behind a separate short-lived lock: account and chain reads never wait on
//! an open external session.

mod error;
mod state;

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::{broadcast, Mutex as AsyncMutex};

use crate::communicator::{Communicator, ExternalSession};
use crate::crypto::{KeyPair, PublicKey};
use crate::message::{
    AppMetadata, ConfigContent, Content, Exchange, HandshakeContent, Message, Preference,
    ProtocolViolation, RequestArguments, ResponseData, RpcRequest, RpcResponse, RpcResult,
    SignerType,
};
use crate::storage::{KeyValueStore, ScopedStorage};

pub use error::SignerError;
pub use state::{Chain, SessionEvent, DEFAULT_CHAIN_ID};

use state::{Established, SessionState};

pub const DEFAULT_STORAGE_SCOPE: &str = "signlink";
pub const DEFAULT_STORAGE_MODULE: &str = "SignerConfigurator";
/// Key of the persisted signer kind within the session's storage scope
pub const SIGNER_TYPE_KEY: &str = "SignerType";

const EVENT_CAPACITY: usize = 16;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub metadata: AppMetadata,
    pub preference: Preference,
    pub storage_scope: String,
    pub storage_module: Option<String>,
}

impl SessionConfig {
    pub fn new(metadata: AppMetadata) -> Self {
        Self {
            metadata,
            preference: Preference::default(),
            storage_scope: DEFAULT_STORAGE_SCOPE.to_string(),
            storage_module: Some(DEFAULT_STORAGE_MODULE.to_string()),
        }
    }

    pub fn with_preference(mut self, preference: Preference) -> Self {
        self.preference = preference;
        self
    }

    pub fn with_storage_scope(mut self, scope: impl Into<String>, module: Option<String>) -> Self {
        self.storage_scope = scope.into();
        self.storage_module = module;
        self
    }
}

#[derive(Debug)]
struct Inner {
    /// Signer kind once read from storage or negotiated
    signer_type: Option<SignerType>,
    state: SessionState,
}

/// Encrypted session with a remote signer
pub struct SignerSession<S, E> {
    metadata: AppMetadata,
    preference: Preference,
    communicator: Communicator<E>,
    storage: ScopedStorage<S>,
    /// Held for a whole relay round trip
    ops: AsyncMutex<()>,
    /// Never held across an await
    inner: Mutex<Inner>,
    events: broadcast::Sender<SessionEvent>,
}

impl<S, E> SignerSession<S, E>
where
    S: KeyValueStore,
    E: ExternalSession,
{
    pub fn new(config: SessionConfig, communicator: Communicator<E>, store: S) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let state = SessionState::new(&config.metadata);
        Self {
            storage: ScopedStorage::new(store, config.storage_scope, config.storage_module),
            metadata: config.metadata,
            preference: config.preference,
            communicator,
            ops: AsyncMutex::new(()),
            inner: Mutex::new(Inner {
                signer_type: None,
                state,
            }),
            events,
        }
    }

    pub fn communicator(&self) -> &Communicator<E> {
        &self.communicator
    }

    pub fn storage(&self) -> &ScopedStorage<S> {
        &self.storage
    }

    /// Receive account, chain and disconnect updates
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// The signer kind in use, negotiating it with the relay if needed
    pub async fn signer_type(&self) -> Result<SignerType, SignerError> {
        let _op = self.ops.lock().await;
        self.select_signer_type().await
    }

    /// Establish a session and return the wallet's accounts
    ///
    /// A no-op returning the cached accounts when already connected. On
    /// failure nothing is retained; the next call starts over with a fresh
    /// keypair.
    pub async fn connect(&self) -> Result<Vec<String>, SignerError> {
        let _op = self.ops.lock().await;
        self.connect_locked().await
    }

    /// Drop the session key and forget the persisted signer kind
    ///
    /// Does not wait for an open external session. A request still in flight
    /// keeps its own key until it returns but no longer updates this session.
    pub async fn disconnect(&self) -> Result<(), SignerError> {
        {
            let mut inner = self.inner.lock();
            inner.state = SessionState::new(&self.metadata);
            inner.signer_type = None;
        }
        self.storage.clear().await?;

        tracing::info!("signer session disconnected");
        self.emit(SessionEvent::Disconnected);
        Ok(())
    }

    pub async fn is_connected(&self) -> bool {
        self.inner.lock().state.is_connected()
    }

    pub async fn get_accounts(&self) -> Result<Vec<String>, SignerError> {
        let inner = self.inner.lock();
        if !inner.state.is_connected() {
            return Err(SignerError::NotConnected);
        }
        Ok(inner.state.accounts.clone())
    }

    pub async fn get_chain_id(&self) -> u64 {
        self.inner.lock().state.chain.id
    }

    pub async fn get_chain(&self) -> Chain {
        self.inner.lock().state.chain.clone()
    }

    pub async fn switch_chain(&self, chain_id: u64) -> Result<(), SignerError> {
        let args = RequestArguments::new("wallet_switchEthereumChain")
            .with_params(json!([{ "chainId": format!("0x{:x}", chain_id) }]));
        self.request(args).await.map(|_| ())
    }

    /// Route a JSON-RPC request
    ///
    /// Account and chain queries are answered from session state without
    /// waiting on the relay; everything else requires a connected session,
    /// goes to the remote signer and queues behind other relay round trips.
    pub async fn request(&self, args: RequestArguments) -> Result<Value, SignerError> {
        let method = args.method.clone();
        tracing::debug!(%method, "signer request");

        match method.as_str() {
            "eth_requestAccounts" => {
                let _op = self.ops.lock().await;
                Ok(json!(self.connect_locked().await?))
            }
            "eth_accounts" => self.get_accounts().await.map(|accounts| json!(accounts)),
            "eth_coinbase" => {
                let inner = self.inner.lock();
                inner
                    .state
                    .accounts
                    .first()
                    .filter(|_| inner.state.is_connected())
                    .map(|account| json!(account))
                    .ok_or(SignerError::NotConnected)
            }
            "net_version" => Ok(Value::String(self.get_chain_id().await.to_string())),
            "eth_chainId" => Ok(Value::String(format!("0x{:x}", self.get_chain_id().await))),
            "wallet_switchEthereumChain" => {
                let _op = self.ops.lock().await;
                self.switch_chain_locked(args).await
            }
            _ => {
                let _op = self.ops.lock().await;
                self.send_encrypted(args).await
            }
        }
    }

    async fn select_signer_type(&self) -> Result<SignerType, SignerError> {
        if let Some(signer_type) = self.inner.lock().signer_type {
            return Ok(signer_type);
        }

        if let Some(stored) = self.storage.get(SIGNER_TYPE_KEY).await? {
            match stored.parse::<SignerType>() {
                Ok(signer_type) => {
                    tracing::debug!(%signer_type, "using persisted signer type");
                    self.inner.lock().signer_type = Some(signer_type);
                    return Ok(signer_type);
                }
                Err(e) => {
                    tracing::warn!("discarding persisted signer type: {}", e);
                    self.storage.remove(SIGNER_TYPE_KEY).await?;
                }
            }
        }

        let request = Message::new(Content::Config(ConfigContent::select_signer_type(
            &self.preference,
        )));
        let response = self
            .communicator
            .post_request_and_wait_for_response(&request, Exchange::Negotiation)
            .await?;

        let signer_type = match response.content {
            Content::Config(config) => config.signer_type()?,
            other => {
                return Err(ProtocolViolation::UnexpectedContent {
                    exchange: Exchange::Negotiation,
                    content: other.kind(),
                }
                .into())
            }
        };
        if signer_type != SignerType::Scw {
            return Err(SignerError::UnsupportedSignerType(signer_type));
        }

        self.storage
            .set(SIGNER_TYPE_KEY, signer_type.as_str())
            .await?;
        self.inner.lock().signer_type = Some(signer_type);
        tracing::info!(%signer_type, "signer type selected");
        Ok(signer_type)
    }

    /// Connect while holding the operation lock
    async fn connect_locked(&self) -> Result<Vec<String>, SignerError> {
        {
            let inner = self.inner.lock();
            if inner.state.is_connected() {
                return Ok(inner.state.accounts.clone());
            }
        }

        let signer_type = self.select_signer_type().await?;
        if signer_type != SignerType::Scw {
            return Err(SignerError::UnsupportedSignerType(signer_type));
        }

        let (established, accounts, data) = self.handshake().await?;

        let mut state = SessionState::new(&self.metadata);
        if let Some(data) = &data {
            state.apply_data(data);
        }
        tracing::info!(
            peer = %established.peer_public,
            accounts = accounts.len(),
            "signer session established"
        );
        state.established = Some(Arc::new(established));
        state.accounts = accounts.clone();
        self.inner.lock().state = state;

        self.emit(SessionEvent::AccountsChanged(accounts.clone()));
        Ok(accounts)
    }

    async fn handshake(
        &self,
    ) -> Result<(Established, Vec<String>, Option<ResponseData>), SignerError> {
        let keypair = KeyPair::generate();
        let own_public = keypair.public();

        let request = Message::new(Content::Handshake(HandshakeContent::request_accounts(
            self.metadata.clone(),
        )))
        .with_sender(&own_public);
        let response = self
            .communicator
            .post_request_and_wait_for_response(&request, Exchange::Handshake)
            .await?;

        let encrypted = match response.content {
            Content::Encrypted(encrypted) => encrypted,
            Content::Failure(error) => return Err(SignerError::Rpc(error)),
            other => {
                return Err(ProtocolViolation::UnexpectedContent {
                    exchange: Exchange::Handshake,
                    content: other.kind(),
                }
                .into())
            }
        };

        let sender = response.sender.as_deref().ok_or_else(|| {
            SignerError::HandshakeFailed("response carries no public key".to_string())
        })?;
        let peer_public = PublicKey::from_hex(sender)
            .map_err(|e| SignerError::HandshakeFailed(format!("invalid peer key: {}", e)))?;
        let established = Established::new(keypair.derive(&peer_public), own_public, peer_public);

        let response: RpcResponse = established
            .open(&encrypted)
            .map_err(|e| SignerError::HandshakeFailed(e.to_string()))?;
        let accounts = match &response.result {
            RpcResult::Value(value) => parse_accounts(value).ok_or_else(|| {
                SignerError::HandshakeFailed("response carries no account list".to_string())
            })?,
            RpcResult::Error(error) => return Err(SignerError::Rpc(error.clone())),
        };
        if accounts.is_empty() {
            return Err(SignerError::HandshakeFailed(
                "wallet returned no accounts".to_string(),
            ));
        }

        Ok((established, accounts, response.data))
    }

    async fn switch_chain_locked(&self, args: RequestArguments) -> Result<Value, SignerError> {
        let chain_id = parse_switch_chain_id(args.params.as_ref())?;

        let known = self.inner.lock().state.switch_to_known(chain_id);
        if let Some(changed) = known {
            if changed {
                self.emit(SessionEvent::ChainChanged(chain_id));
            }
            return Ok(Value::Null);
        }

        let value = self.send_encrypted(args).await?;
        let changed = self.inner.lock().state.set_chain(chain_id);
        if changed {
            self.emit(SessionEvent::ChainChanged(chain_id));
        }
        Ok(value)
    }

    async fn send_encrypted(&self, action: RequestArguments) -> Result<Value, SignerError> {
        let (established, chain_id) = {
            let inner = self.inner.lock();
            match &inner.state.established {
                Some(established) if inner.state.is_connected() => {
                    (established.clone(), inner.state.chain.id)
                }
                _ => return Err(SignerError::NotConnected),
            }
        };
        let method = action.method.clone();

        let sealed = established.seal(&RpcRequest { action, chain_id })?;
        let request =
            Message::new(Content::Encrypted(sealed)).with_sender(&established.own_public);
        let response = self
            .communicator
            .post_request_and_wait_for_response(&request, Exchange::Session)
            .await?;

        let response: RpcResponse = match response.content {
            Content::Encrypted(encrypted) => established.open(&encrypted)?,
            Content::Failure(error) => return Err(SignerError::Rpc(error)),
            other => {
                return Err(ProtocolViolation::UnexpectedContent {
                    exchange: Exchange::Session,
                    content: other.kind(),
                }
                .into())
            }
        };

        if let Some(data) = &response.data {
            let mut inner = self.inner.lock();
            // a disconnect while the request was out discards its data
            if inner.state.is_current(&established) {
                inner.state.apply_data(data);
            }
        }
        match response.result {
            RpcResult::Value(value) => {
                tracing::debug!(%method, "signer request answered");
                Ok(value)
            }
            RpcResult::Error(error) => {
                tracing::debug!(%method, "signer request failed: {}", error);
                Err(SignerError::Rpc(error))
            }
        }
    }

    fn emit(&self, event: SessionEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }
}

fn parse_accounts(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|account| account.as_str().map(str::to_string))
        .collect()
}

/// Chain id from `[{"chainId": "0x2105"}]`
fn parse_switch_chain_id(params: Option<&Value>) -> Result<u64, SignerError> {
    let chain_id = params
        .and_then(|params| params.get(0))
        .and_then(|param| param.get("chainId"))
        .ok_or_else(|| SignerError::InvalidParams("missing chainId".to_string()))?;

    match chain_id {
        Value::String(s) => {
            let parsed = match s.strip_prefix("0x") {
                Some(hex) => u64::from_str_radix(hex, 16),
                None => s.parse(),
            };
            parsed.map_err(|_| SignerError::InvalidParams(format!("invalid chainId: {}", s)))
        }
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| SignerError::InvalidParams(format!("invalid chainId: {}", n))),
        other => Err(SignerError::InvalidParams(format!(
            "invalid chainId: {}",
            other
        ))),
    }
}
