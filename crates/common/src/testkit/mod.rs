/// In-process stand-in for the relay and remote wallet
///
/// [`MockWallet`] implements [`ExternalSession`](crate::communicator::ExternalSession):
/// instead of opening a browser it decodes the outbound url, plays the remote
/// signer and redirects straight back to the callback url. Each open can be
/// scripted to misbehave.
///
/// # Example
///
/// ```rust,ignore
/// use common::testkit::{Behaviour, MockWallet};
///
/// #[tokio::test]
/// async fn test_cancel_then_connect() -> anyhow::Result<()> {
///     let wallet = MockWallet::new();
///     let session = signer_session(wallet.clone());
///
///     // The user closes the browser on the first attempt
///     wallet.push(Behaviour::Cancel);
///     assert!(session.connect().await.is_err());
///
///     // Unscripted opens answer normally
///     let accounts = session.connect().await?;
///     assert_eq!(accounts, wallet.accounts());
///     Ok(())
/// }
/// ```
mod behaviour;
mod wallet;

pub use behaviour::Behaviour;
pub use wallet::{MockWallet, MOCK_ACCOUNT, MOCK_TX_HASH};
