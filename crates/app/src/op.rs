use std::error::Error;
use std::path::PathBuf;

use common::communicator::Communicator;
use common::signer::SignerSession;
use common::storage::FileStore;

use crate::state::{AppState, StateError};
use crate::terminal::TerminalSession;

/// Session as driven from the terminal, persisting to the state directory
pub type CliSession = SignerSession<FileStore, TerminalSession>;

#[derive(Clone)]
pub struct OpContext {
    /// Optional custom config path (defaults to ~/.signlink)
    pub config_path: Option<PathBuf>,
}

impl OpContext {
    pub fn new(config_path: Option<PathBuf>) -> Self {
        Self { config_path }
    }

    pub fn load_state(&self) -> Result<AppState, StateError> {
        AppState::load(self.config_path.clone())
    }

    /// Build a signer session from the loaded state
    ///
    /// Key material lives only as long as the returned session; each
    /// process performs its own handshake.
    pub fn session(&self) -> Result<CliSession, StateError> {
        let state = self.load_state()?;
        Ok(session_for(&state, TerminalSession::stdio()))
    }
}

pub fn session_for(state: &AppState, terminal: TerminalSession) -> CliSession {
    let communicator = Communicator::new(state.config.communicator_config(), terminal);
    SignerSession::new(
        state.config.session_config(),
        communicator,
        FileStore::new(&state.storage_path),
    )
}

#[async_trait::async_trait]
pub trait Op: Send + Sync {
    type Error: Error + Send + Sync + 'static;
    type Output;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error>;
}

#[macro_export]
macro_rules! command_enum {
    ($(($variant:ident, $type:ty)),* $(,)?) => {
        #[derive(Subcommand, Debug, Clone)]
        pub enum Command {
            $($variant($type),)*
        }

        #[derive(Debug)]
        pub enum OpOutput {
            $($variant(<$type as $crate::op::Op>::Output),)*
        }

        #[derive(Debug, thiserror::Error)]
        pub enum OpError {
            $(
                #[error(transparent)]
                $variant(<$type as $crate::op::Op>::Error),
            )*
        }

        #[async_trait::async_trait]
        impl $crate::op::Op for Command {
            type Output = OpOutput;
            type Error = OpError;

            async fn execute(&self, ctx: &$crate::op::OpContext) -> Result<Self::Output, Self::Error> {
                match self {
                    $(
                        Command::$variant(op) => {
                            op.execute(ctx).await
                                .map(OpOutput::$variant)
                                .map_err(OpError::$variant)
                        },
                    )*
                }
            }
        }

        impl std::fmt::Display for OpOutput {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        OpOutput::$variant(output) => write!(f, "{}", output),
                    )*
                }
            }
        }
    };
}
