//! Shared test utilities for signer session integration tests
#![allow(dead_code)]

use std::time::Duration;

use common::communicator::{Communicator, CommunicatorConfig};
use common::message::AppMetadata;
use common::signer::{SessionConfig, SignerSession};
use common::storage::{KeyValueStore, MemoryStore};
use common::testkit::MockWallet;
use tracing_subscriber::EnvFilter;
use url::Url;

pub const RELAY_URL: &str = "https://relay.test/connect";
pub const CALLBACK_URL: &str = "demo://callback";

pub type TestSession<S = MemoryStore> = SignerSession<S, MockWallet>;

pub fn communicator_config() -> CommunicatorConfig {
    CommunicatorConfig::new(
        Url::parse(RELAY_URL).unwrap(),
        Url::parse(CALLBACK_URL).unwrap(),
    )
    .with_timeout(Some(Duration::from_secs(5)))
}

pub fn metadata() -> AppMetadata {
    AppMetadata::new("Demo").with_chain_ids(vec![1, 8453])
}

/// A signer session backed by `store`, talking to `wallet`
pub fn session_with_store<S: KeyValueStore>(wallet: &MockWallet, store: S) -> TestSession<S> {
    let communicator = Communicator::new(communicator_config(), wallet.clone());
    SignerSession::new(SessionConfig::new(metadata()), communicator, store)
}

/// Route library logs to the test writer; `RUST_LOG` selects the level
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Set up a fresh mock wallet, in-memory store and signer session
pub fn setup_session() -> (TestSession, MockWallet, MemoryStore) {
    init_tracing();
    let wallet = MockWallet::new();
    let store = MemoryStore::new();
    let session = session_with_store(&wallet, store.clone());
    (session, wallet, store)
}

/// Set up a session that is already connected
pub async fn setup_connected() -> (TestSession, MockWallet, MemoryStore) {
    let (session, wallet, store) = setup_session();
    session.connect().await.unwrap();
    (session, wallet, store)
}
