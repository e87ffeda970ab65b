//! Integration tests for signer session connection and teardown

mod common;

use ::common::codec::ErrorObject;
use ::common::communicator::CommunicatorState;
use ::common::message::{error_codes, Content, ProtocolViolation, SignerType};
use ::common::signer::{SessionEvent, SignerError, SIGNER_TYPE_KEY};
use ::common::storage::{KeyValueStore, MemoryStore};
use ::common::testkit::{Behaviour, MockWallet, MOCK_ACCOUNT};

#[tokio::test]
async fn test_connect_happy_path() {
    let (session, wallet, store) = common::setup_session();
    let mut events = session.subscribe();

    let accounts = session.connect().await.unwrap();
    assert_eq!(accounts, vec![MOCK_ACCOUNT.to_string()]);
    assert!(session.is_connected().await);

    // negotiation, then handshake
    let requests = wallet.requests();
    assert_eq!(requests.len(), 2);
    assert!(matches!(requests[0].content, Content::Config(_)));
    match &requests[1].content {
        Content::Handshake(handshake) => assert_eq!(handshake.params.app_name, "Demo"),
        other => panic!("expected handshake, got {:?}", other),
    }
    assert!(requests[1].sender.is_some());

    // signer choice persisted under its scope
    let entries = store.entries().unwrap();
    assert_eq!(
        entries
            .get(&format!("signlink:SignerConfigurator:{}", SIGNER_TYPE_KEY))
            .map(String::as_str),
        Some("scw")
    );

    assert_eq!(
        events.recv().await.unwrap(),
        SessionEvent::AccountsChanged(vec![MOCK_ACCOUNT.to_string()])
    );
    assert_eq!(session.communicator().state(), CommunicatorState::Idle);
}

#[tokio::test]
async fn test_connect_twice_is_cached() {
    let (session, wallet, _store) = common::setup_connected().await;
    let opened = wallet.requests().len();

    let accounts = session.connect().await.unwrap();
    assert_eq!(accounts, wallet.accounts());
    assert_eq!(wallet.requests().len(), opened);
}

#[tokio::test]
async fn test_cached_signer_type_skips_negotiation() {
    let wallet = MockWallet::new();
    let store = MemoryStore::new();
    store
        .set("signlink:SignerConfigurator:SignerType", "scw")
        .await
        .unwrap();
    let session = common::session_with_store(&wallet, store);

    session.connect().await.unwrap();

    let requests = wallet.requests();
    assert_eq!(requests.len(), 1);
    assert!(matches!(requests[0].content, Content::Handshake(_)));
}

#[tokio::test]
async fn test_cancel_then_fresh_handshake() {
    let (session, wallet, _store) = common::setup_session();

    // signer selection succeeds, the handshake is cancelled
    wallet.push(Behaviour::Respond);
    wallet.push(Behaviour::Cancel);
    let result = session.connect().await;
    assert!(matches!(result, Err(SignerError::UserRejected)));
    assert!(!session.is_connected().await);
    assert!(!wallet.has_session());

    session.connect().await.unwrap();

    // the retry skipped negotiation and sent a different public key
    let requests = wallet.requests();
    assert_eq!(requests.len(), 3);
    let first_key = requests[1].sender.clone().unwrap();
    let second_key = requests[2].sender.clone().unwrap();
    assert_ne!(first_key, second_key);
    assert_eq!(wallet.handshake_keys().len(), 1);
}

#[tokio::test]
async fn test_dismissed_negotiation_persists_nothing() {
    let (session, wallet, store) = common::setup_session();
    wallet.push(Behaviour::Dismiss);

    let result = session.connect().await;
    assert!(matches!(result, Err(SignerError::UserRejected)));
    assert!(store.entries().unwrap().is_empty());
}

#[tokio::test]
async fn test_tampered_callback_is_codec_error() {
    let (session, wallet, _store) = common::setup_session();
    wallet.push(Behaviour::Respond);
    wallet.push(Behaviour::CorruptCallback);

    let result = session.connect().await;
    assert!(matches!(result, Err(SignerError::Codec(_))));
    assert_eq!(result.unwrap_err().code(), error_codes::PARSE);
    assert!(!session.is_connected().await);
}

#[tokio::test]
async fn test_missing_message_is_user_rejected() {
    let (session, wallet, _store) = common::setup_session();
    wallet.push(Behaviour::DropMessage);

    let result = session.connect().await;
    assert!(matches!(result, Err(SignerError::UserRejected)));
}

#[tokio::test]
async fn test_wrong_correlation_is_rejected() {
    let (session, wallet, store) = common::setup_session();
    wallet.push(Behaviour::WrongCorrelation);

    let result = session.connect().await;
    assert!(matches!(
        result,
        Err(SignerError::Protocol(
            ProtocolViolation::CorrelationMismatch { .. }
        ))
    ));
    assert!(store.entries().unwrap().is_empty());
    assert!(!session.is_connected().await);
}

#[tokio::test]
async fn test_unsupported_signer_type() {
    let wallet = MockWallet::new().with_signer_type(SignerType::WalletLink);
    let store = MemoryStore::new();
    let session = common::session_with_store(&wallet, store.clone());

    let result = session.connect().await;
    assert!(matches!(
        result,
        Err(SignerError::UnsupportedSignerType(SignerType::WalletLink))
    ));
    assert!(store.entries().unwrap().is_empty());
    assert_eq!(wallet.requests().len(), 1);
}

#[tokio::test]
async fn test_garbage_persisted_signer_type_is_renegotiated() {
    let wallet = MockWallet::new();
    let store = MemoryStore::new();
    store
        .set("signlink:SignerConfigurator:SignerType", "carrier-pigeon")
        .await
        .unwrap();
    let session = common::session_with_store(&wallet, store.clone());

    assert_eq!(session.signer_type().await.unwrap(), SignerType::Scw);
    assert_eq!(wallet.requests().len(), 1);
    assert_eq!(
        store
            .get("signlink:SignerConfigurator:SignerType")
            .await
            .unwrap()
            .as_deref(),
        Some("scw")
    );
}

#[tokio::test]
async fn test_handshake_rejected_by_wallet() {
    let (session, wallet, _store) = common::setup_session();
    wallet.push(Behaviour::Respond);
    wallet.push(Behaviour::Reject(ErrorObject::new(
        error_codes::USER_REJECTED,
        "User denied account authorization",
    )));

    let error = session.connect().await.unwrap_err();
    assert!(error.is_user_rejection());
    assert_eq!(error.code(), error_codes::USER_REJECTED);
    assert!(!session.is_connected().await);
}

#[tokio::test]
async fn test_empty_accounts_fail_handshake() {
    let wallet = MockWallet::new().with_accounts(Vec::new());
    let session = common::session_with_store(&wallet, MemoryStore::new());

    let result = session.connect().await;
    assert!(matches!(result, Err(SignerError::HandshakeFailed(_))));
    assert!(!session.is_connected().await);
}

#[tokio::test]
async fn test_disconnect_forgets_everything() {
    let (session, wallet, store) = common::setup_connected().await;
    let mut events = session.subscribe();

    session.disconnect().await.unwrap();
    assert!(!session.is_connected().await);
    assert!(store.entries().unwrap().is_empty());
    assert_eq!(events.recv().await.unwrap(), SessionEvent::Disconnected);
    assert!(matches!(
        session.get_accounts().await,
        Err(SignerError::NotConnected)
    ));

    // reconnecting negotiates again and runs a new handshake
    session.connect().await.unwrap();
    let requests = wallet.requests();
    assert_eq!(requests.len(), 4);
    assert!(matches!(requests[2].content, Content::Config(_)));
    assert!(matches!(requests[3].content, Content::Handshake(_)));
    assert_ne!(requests[1].sender, requests[3].sender);
}

#[tokio::test]
async fn test_session_adapter_failure() {
    let (session, wallet, _store) = common::setup_session();
    wallet.push(Behaviour::Fail("browser crashed".to_string()));

    let result = session.connect().await;
    assert!(matches!(result, Err(SignerError::Session(_))));
    assert_eq!(session.communicator().state(), CommunicatorState::Idle);
}
