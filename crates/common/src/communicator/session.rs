use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

/// How an external interactive session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthSessionResult {
    /// The session redirected to the callback url
    Success { url: Url },
    /// The user closed or cancelled the session
    Cancel,
    /// The session was dismissed by the platform without a redirect
    Dismiss,
    /// Another session is already open and this one could not start
    Locked,
}

/// An out-of-band interactive session, typically a browser auth flow
///
/// `open` presents `url` to the user and resolves once the session ends. A
/// successful session redirects to (a url starting with) `callback_url`.
/// Implementations decide how long they wait; the communicator enforces its
/// own deadline on top.
#[async_trait]
pub trait ExternalSession: Send + Sync {
    async fn open(&self, url: Url, callback_url: &Url) -> anyhow::Result<AuthSessionResult>;
}

#[async_trait]
impl<T> ExternalSession for Arc<T>
where
    T: ExternalSession + ?Sized,
{
    async fn open(&self, url: Url, callback_url: &Url) -> anyhow::Result<AuthSessionResult> {
        (**self).open(url, callback_url).await
    }
}
