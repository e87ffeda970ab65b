use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::codec::HexBytes;
use crate::crypto::{
    open, seal, CipherError, DecryptionError, EnvelopeError, PublicKey, Sealable, SessionKey,
};
use crate::message::{AppMetadata, EncryptedContent, ResponseData};

/// Chain id used when the app declares none
pub const DEFAULT_CHAIN_ID: u64 = 1;

/// State changes pushed to subscribers of a signer session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    AccountsChanged(Vec<String>),
    ChainChanged(u64),
    Disconnected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain {
    pub id: u64,
    /// RPC url the remote signer advertised for this chain
    pub rpc_url: Option<String>,
}

impl Chain {
    pub fn new(id: u64) -> Self {
        Self { id, rpc_url: None }
    }
}

/// Keys of an established session
///
/// Lives only in memory; dropping it zeroizes the session key. Every nonce
/// sealed or opened under the key is remembered, and an envelope reusing one
/// is refused before decryption.
#[derive(Debug)]
pub(crate) struct Established {
    key: SessionKey,
    /// Our public key, sent as `sender` on every request
    pub own_public: PublicKey,
    pub peer_public: PublicKey,
    nonces: Mutex<HashSet<HexBytes>>,
}

impl Established {
    pub fn new(key: SessionKey, own_public: PublicKey, peer_public: PublicKey) -> Self {
        Self {
            key,
            own_public,
            peer_public,
            nonces: Mutex::new(HashSet::new()),
        }
    }

    pub fn seal<T: Sealable>(&self, content: &T) -> Result<EncryptedContent, EnvelopeError> {
        let sealed = seal(&self.key, content)?;
        self.nonces.lock().insert(sealed.iv.clone());
        Ok(sealed)
    }

    /// Open `encrypted`, refusing a nonce this session has already used
    ///
    /// A nonce is recorded only once its envelope authenticates.
    pub fn open<T: DeserializeOwned>(
        &self,
        encrypted: &EncryptedContent,
    ) -> Result<T, EnvelopeError> {
        if self.nonces.lock().contains(&encrypted.iv) {
            return Err(DecryptionError::from(CipherError::ReplayedNonce).into());
        }
        let content = open(&self.key, encrypted)?;
        if !self.nonces.lock().insert(encrypted.iv.clone()) {
            return Err(DecryptionError::from(CipherError::ReplayedNonce).into());
        }
        Ok(content)
    }
}

/// Everything a signer session knows about the remote wallet
#[derive(Debug)]
pub(crate) struct SessionState {
    pub established: Option<Arc<Established>>,
    pub accounts: Vec<String>,
    pub chain: Chain,
    pub chains: BTreeMap<u64, String>,
    pub capabilities: Option<Value>,
}

impl SessionState {
    pub fn new(metadata: &AppMetadata) -> Self {
        let chain_id = metadata
            .app_chain_ids
            .first()
            .copied()
            .unwrap_or(DEFAULT_CHAIN_ID);
        Self {
            established: None,
            accounts: Vec::new(),
            chain: Chain::new(chain_id),
            chains: BTreeMap::new(),
            capabilities: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.established.is_some() && !self.accounts.is_empty()
    }

    /// Whether `established` is still this state's session
    pub fn is_current(&self, established: &Arc<Established>) -> bool {
        self.established
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, established))
    }

    /// Fold relay-provided session data in
    pub fn apply_data(&mut self, data: &ResponseData) {
        if let Some(chains) = &data.chains {
            self.chains = chains.clone();
            self.chain.rpc_url = self.chains.get(&self.chain.id).cloned();
        }
        if let Some(capabilities) = &data.capabilities {
            self.capabilities = Some(capabilities.clone());
        }
    }

    /// Make `chain_id` active if the relay advertised it
    ///
    /// `None` if the chain is unknown, otherwise whether the active chain
    /// changed.
    pub fn switch_to_known(&mut self, chain_id: u64) -> Option<bool> {
        let rpc_url = self.chains.get(&chain_id)?.clone();
        let changed = self.chain.id != chain_id;
        self.chain = Chain {
            id: chain_id,
            rpc_url: Some(rpc_url),
        };
        Some(changed)
    }

    /// Make `chain_id` active regardless of what the relay advertised
    pub fn set_chain(&mut self, chain_id: u64) -> bool {
        let changed = self.chain.id != chain_id;
        self.chain = Chain {
            id: chain_id,
            rpc_url: self.chains.get(&chain_id).cloned(),
        };
        changed
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;
    use crate::crypto::KeyPair;

    /// Both ends of one session
    fn established_pair() -> (Established, Established) {
        let app = KeyPair::generate();
        let wallet = KeyPair::generate();
        (
            Established::new(app.derive(&wallet.public()), app.public(), wallet.public()),
            Established::new(wallet.derive(&app.public()), wallet.public(), app.public()),
        )
    }

    fn is_replay(result: Result<Value, EnvelopeError>) -> bool {
        matches!(
            result,
            Err(EnvelopeError::Decryption(DecryptionError(
                CipherError::ReplayedNonce
            )))
        )
    }

    fn chains() -> ResponseData {
        ResponseData {
            chains: Some(BTreeMap::from([
                (1, "https://eth.example".to_string()),
                (8453, "https://base.example".to_string()),
            ])),
            capabilities: None,
        }
    }

    #[test]
    fn test_initial_chain() {
        let state = SessionState::new(&AppMetadata::new("Demo"));
        assert_eq!(state.chain, Chain::new(DEFAULT_CHAIN_ID));

        let state = SessionState::new(&AppMetadata::new("Demo").with_chain_ids(vec![8453, 1]));
        assert_eq!(state.chain.id, 8453);
        assert!(!state.is_connected());
    }

    #[test]
    fn test_apply_data_resolves_rpc_url() {
        let mut state = SessionState::new(&AppMetadata::new("Demo"));
        state.apply_data(&chains());
        assert_eq!(state.chain.rpc_url.as_deref(), Some("https://eth.example"));
    }

    #[test]
    fn test_switch_to_known() {
        let mut state = SessionState::new(&AppMetadata::new("Demo"));
        assert_eq!(state.switch_to_known(8453), None);

        state.apply_data(&chains());
        assert_eq!(state.switch_to_known(8453), Some(true));
        assert_eq!(state.switch_to_known(8453), Some(false));
        assert_eq!(state.chain.rpc_url.as_deref(), Some("https://base.example"));
    }

    #[test]
    fn test_open_refuses_replayed_nonce() {
        let (app, wallet) = established_pair();
        let sealed = wallet.seal(&json!(["0xabc"])).unwrap();

        assert_eq!(app.open::<Value>(&sealed).unwrap(), json!(["0xabc"]));
        assert!(is_replay(app.open::<Value>(&sealed)));
    }

    #[test]
    fn test_open_refuses_own_nonce() {
        let (app, _) = established_pair();
        let sealed = app.seal(&json!({"method": "personal_sign"})).unwrap();
        assert!(is_replay(app.open::<Value>(&sealed)));
    }

    #[test]
    fn test_failed_open_does_not_burn_nonce() {
        let (app, wallet) = established_pair();
        let sealed = wallet.seal(&json!(1)).unwrap();

        let mut tampered = sealed.clone();
        let mut bytes = tampered.cipher_text.to_vec();
        bytes[0] ^= 1;
        tampered.cipher_text = HexBytes::new(bytes);
        assert!(matches!(
            app.open::<Value>(&tampered),
            Err(EnvelopeError::Decryption(_))
        ));

        assert_eq!(app.open::<Value>(&sealed).unwrap(), json!(1));
    }

    #[test]
    fn test_is_current() {
        let (app, _) = established_pair();
        let app = Arc::new(app);
        let mut state = SessionState::new(&AppMetadata::new("Demo"));
        assert!(!state.is_current(&app));

        state.established = Some(app.clone());
        assert!(state.is_current(&app));

        let (other, _) = established_pair();
        assert!(!state.is_current(&Arc::new(other)));
    }
}
