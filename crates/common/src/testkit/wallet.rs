use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use url::Url;

use super::Behaviour;
use crate::codec::ErrorObject;
use crate::communicator::{
    build_callback_url, parse_request_url, AuthSessionResult, ExternalSession, MESSAGE_PARAM,
};
use crate::crypto::{open, seal, KeyPair, PublicKey, SessionKey};
use crate::message::{
    error_codes, ConfigContent, Content, Message, MessageId, ResponseData, RpcRequest,
    RpcResponse, SignerType,
};

/// Account every mock wallet starts with
pub const MOCK_ACCOUNT: &str = "0xabc0000000000000000000000000000000000001";
/// Hash returned for every `eth_sendTransaction`
pub const MOCK_TX_HASH: &str =
    "0x1111111111111111111111111111111111111111111111111111111111111111";

/// Scriptable remote wallet, shared between clones
#[derive(Debug, Clone)]
pub struct MockWallet {
    inner: Arc<Mutex<MockWalletInner>>,
}

#[derive(Debug)]
struct MockWalletInner {
    signer_type: SignerType,
    accounts: Vec<String>,
    chains: BTreeMap<u64, String>,
    script: VecDeque<Behaviour>,
    /// Session key of the last completed handshake
    session_key: Option<SessionKey>,
    public_key: Option<PublicKey>,
    /// App public keys received in handshakes, oldest first
    handshake_keys: Vec<PublicKey>,
    requests: Vec<Message>,
    rpc_calls: Vec<RpcRequest>,
    last_response: Option<Message>,
}

impl Default for MockWallet {
    fn default() -> Self {
        Self::new()
    }
}

impl MockWallet {
    pub fn new() -> Self {
        let inner = MockWalletInner {
            signer_type: SignerType::Scw,
            accounts: vec![MOCK_ACCOUNT.to_string()],
            chains: BTreeMap::from([
                (1, "https://mainnet.example.org".to_string()),
                (8453, "https://base.example.org".to_string()),
            ]),
            script: VecDeque::new(),
            session_key: None,
            public_key: None,
            handshake_keys: Vec::new(),
            requests: Vec::new(),
            rpc_calls: Vec::new(),
            last_response: None,
        };
        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    pub fn with_signer_type(self, signer_type: SignerType) -> Self {
        self.inner.lock().signer_type = signer_type;
        self
    }

    pub fn with_accounts(self, accounts: Vec<String>) -> Self {
        self.inner.lock().accounts = accounts;
        self
    }

    pub fn with_chains(self, chains: BTreeMap<u64, String>) -> Self {
        self.inner.lock().chains = chains;
        self
    }

    /// Queue a behaviour for the next open; unscripted opens `Respond`
    pub fn push(&self, behaviour: Behaviour) {
        self.inner.lock().script.push_back(behaviour);
    }

    pub fn accounts(&self) -> Vec<String> {
        self.inner.lock().accounts.clone()
    }

    /// Every request the wallet decoded, in order
    pub fn requests(&self) -> Vec<Message> {
        self.inner.lock().requests.clone()
    }

    /// Every sealed request the wallet managed to open, in order
    pub fn rpc_calls(&self) -> Vec<RpcRequest> {
        self.inner.lock().rpc_calls.clone()
    }

    pub fn handshake_keys(&self) -> Vec<PublicKey> {
        self.inner.lock().handshake_keys.clone()
    }

    /// The wallet's public key in the current session
    pub fn public_key(&self) -> Option<PublicKey> {
        self.inner.lock().public_key
    }

    pub fn has_session(&self) -> bool {
        self.inner.lock().session_key.is_some()
    }

    fn last_response(&self) -> Option<Message> {
        self.inner.lock().last_response.clone()
    }

    fn rewrap_last(&self, request: &Message) -> anyhow::Result<Message> {
        let inner = self.inner.lock();
        let last = inner.last_response.as_ref().context("nothing to replay")?;
        let Content::Encrypted(sealed) = &last.content else {
            anyhow::bail!("previous response was not sealed");
        };

        let response = Message::new(Content::Encrypted(sealed.clone())).in_reply_to(&request.id);
        Ok(match inner.public_key {
            Some(public_key) => response.with_sender(&public_key),
            None => response,
        })
    }

    fn next(&self, request: &Message) -> Behaviour {
        let mut inner = self.inner.lock();
        inner.requests.push(request.clone());
        inner.script.pop_front().unwrap_or(Behaviour::Respond)
    }

    fn answer(&self, request: &Message) -> anyhow::Result<Message> {
        let mut inner = self.inner.lock();
        let response = inner.answer(request)?;
        inner.last_response = Some(response.clone());
        Ok(response)
    }
}

impl MockWalletInner {
    fn answer(&mut self, request: &Message) -> anyhow::Result<Message> {
        let response = match &request.content {
            Content::Config(_) => Message::new(Content::Config(
                ConfigContent::signer_type_answer(self.signer_type),
            )),
            Content::Handshake(_) => self.handshake(request)?,
            Content::Encrypted(encrypted) => {
                let key = self
                    .session_key
                    .as_ref()
                    .context("sealed request before any handshake")?;
                let call: RpcRequest = open(key, encrypted)?;
                let response = seal(key, &self.call(&call))?;
                self.rpc_calls.push(call);
                Message::new(Content::Encrypted(response))
            }
            Content::Failure(error) => anyhow::bail!("wallet received failure content: {}", error),
        };

        let response = response.in_reply_to(&request.id);
        Ok(match self.public_key {
            Some(public_key) => response.with_sender(&public_key),
            None => response,
        })
    }

    fn handshake(&mut self, request: &Message) -> anyhow::Result<Message> {
        let sender = request
            .sender
            .as_deref()
            .context("handshake without sender key")?;
        let app_key = PublicKey::from_hex(sender)?;

        let keypair = KeyPair::generate();
        let key = keypair.derive(&app_key);
        let accounts = RpcResponse::value(json!(self.accounts)).with_data(self.data());
        let sealed = seal(&key, &accounts)?;

        self.handshake_keys.push(app_key);
        self.public_key = Some(keypair.public());
        self.session_key = Some(key);
        Ok(Message::new(Content::Encrypted(sealed)))
    }

    fn data(&self) -> ResponseData {
        ResponseData {
            chains: Some(self.chains.clone()),
            capabilities: None,
        }
    }

    fn call(&self, request: &RpcRequest) -> RpcResponse {
        let params = request.action.params.as_ref();
        match request.action.method.as_str() {
            "eth_requestAccounts" | "eth_accounts" => RpcResponse::value(json!(self.accounts)),
            "personal_sign" => {
                let payload = params
                    .and_then(|params| params.get(0))
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                RpcResponse::value(json!(format!("0x{}", hex::encode(payload))))
            }
            "eth_sendTransaction" => RpcResponse::value(json!(MOCK_TX_HASH)),
            "wallet_switchEthereumChain" => {
                let chain_id = params
                    .and_then(|params| params.get(0))
                    .and_then(|param| param.get("chainId"))
                    .and_then(Value::as_str)
                    .and_then(|hex| u64::from_str_radix(hex.trim_start_matches("0x"), 16).ok());
                match chain_id {
                    Some(id) if self.chains.contains_key(&id) => {
                        RpcResponse::value(Value::Null).with_data(self.data())
                    }
                    _ => RpcResponse::error(ErrorObject::new(
                        error_codes::UNRECOGNIZED_CHAIN,
                        "Unrecognized chain ID",
                    )),
                }
            }
            method => RpcResponse::error(ErrorObject::new(
                error_codes::UNSUPPORTED_METHOD,
                format!("method {} is not supported", method),
            )),
        }
    }
}

#[async_trait]
impl ExternalSession for MockWallet {
    async fn open(&self, url: Url, callback_url: &Url) -> anyhow::Result<AuthSessionResult> {
        let (request, callback) = parse_request_url(&url)?;
        anyhow::ensure!(
            &callback == callback_url,
            "request names callback {} but the session expects {}",
            callback,
            callback_url
        );

        let response = match self.next(&request) {
            Behaviour::Respond => self.answer(&request)?,
            Behaviour::Reject(error) => {
                Message::new(Content::Failure(error)).in_reply_to(&request.id)
            }
            Behaviour::WrongCorrelation => {
                let mut response = self.answer(&request)?;
                response.correlation_id = Some(MessageId::new());
                response
            }
            Behaviour::ReplayLast => self.last_response().context("nothing to replay")?,
            Behaviour::ReplaySealed => self.rewrap_last(&request)?,
            Behaviour::Cancel => return Ok(AuthSessionResult::Cancel),
            Behaviour::Dismiss => return Ok(AuthSessionResult::Dismiss),
            Behaviour::Locked => return Ok(AuthSessionResult::Locked),
            Behaviour::DropMessage => return Ok(AuthSessionResult::Success { url: callback }),
            Behaviour::CorruptCallback => {
                let mut url = callback;
                url.query_pairs_mut().append_pair(MESSAGE_PARAM, "{\"id\":");
                return Ok(AuthSessionResult::Success { url });
            }
            Behaviour::Hang => std::future::pending().await,
            Behaviour::Fail(reason) => anyhow::bail!(reason),
        };

        Ok(AuthSessionResult::Success {
            url: build_callback_url(&callback, &response)?,
        })
    }
}
