use std::pin::Pin;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use url::Url;

use common::communicator::{AuthSessionResult, ExternalSession};

type Reader = Pin<Box<dyn AsyncBufRead + Send>>;
type Writer = Pin<Box<dyn AsyncWrite + Send>>;

/// External session run by the operator
///
/// Prints the relay url, then waits for the redirect url to be pasted back.
/// An empty line or end of input cancels. Only one prompt can be open at a
/// time; a second open while one is pending reports `Locked`.
pub struct TerminalSession {
    io: Mutex<(Reader, Writer)>,
}

impl TerminalSession {
    pub fn new(
        reader: impl AsyncBufRead + Send + 'static,
        writer: impl AsyncWrite + Send + 'static,
    ) -> Self {
        Self {
            io: Mutex::new((Box::pin(reader), Box::pin(writer))),
        }
    }

    /// Prompt on stderr, read from stdin
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stderr())
    }
}

#[async_trait]
impl ExternalSession for TerminalSession {
    async fn open(&self, url: Url, callback_url: &Url) -> anyhow::Result<AuthSessionResult> {
        let Ok(mut io) = self.io.try_lock() else {
            return Ok(AuthSessionResult::Locked);
        };
        let (reader, writer) = &mut *io;

        let prompt = format!(
            "Open this url in a browser to continue:\n\n  {}\n\n\
             Paste the url you are redirected to ({}...), or an empty line to cancel:\n",
            url, callback_url
        );
        writer.write_all(prompt.as_bytes()).await?;
        writer.flush().await?;

        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(AuthSessionResult::Dismiss);
        }
        let line = line.trim();
        if line.is_empty() {
            return Ok(AuthSessionResult::Cancel);
        }

        let redirect = Url::parse(line)?;
        if redirect.scheme() != callback_url.scheme()
            || redirect.host_str() != callback_url.host_str()
            || redirect.path() != callback_url.path()
        {
            tracing::warn!(%redirect, "pasted url does not match the callback url");
            return Ok(AuthSessionResult::Cancel);
        }
        Ok(AuthSessionResult::Success { url: redirect })
    }
}
