use clap::{Args, ValueEnum};
use url::Url;

use common::message::PreferenceOption;

use crate::state::{AppConfig, AppState, DEFAULT_CALLBACK_URL, DEFAULT_RELAY_URL};

#[derive(ValueEnum, Debug, Clone, Copy, Default)]
pub enum WalletPreference {
    #[default]
    All,
    SmartWalletOnly,
    EoaOnly,
}

impl From<WalletPreference> for PreferenceOption {
    fn from(value: WalletPreference) -> Self {
        match value {
            WalletPreference::All => PreferenceOption::All,
            WalletPreference::SmartWalletOnly => PreferenceOption::SmartWalletOnly,
            WalletPreference::EoaOnly => PreferenceOption::EoaOnly,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// Relay the external session is pointed at
    #[arg(long, default_value = DEFAULT_RELAY_URL)]
    pub relay_url: Url,

    /// Url the relay redirects back to
    #[arg(long, default_value = DEFAULT_CALLBACK_URL)]
    pub callback_url: Url,

    /// Application name shown in the wallet
    #[arg(long)]
    pub app_name: Option<String>,

    /// Chain the app works with (repeatable, first one is active)
    #[arg(long = "chain-id")]
    pub chain_ids: Vec<u64>,

    /// Seconds to wait for the external session, 0 waits forever
    #[arg(long, default_value_t = 300)]
    pub timeout_secs: u64,

    /// Which wallets the relay should offer
    #[arg(long, value_enum, default_value_t = WalletPreference::All)]
    pub preference: WalletPreference,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("init failed: {0}")]
    StateFailed(#[from] crate::state::StateError),
}

#[async_trait::async_trait]
impl crate::op::Op for Init {
    type Error = InitError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let defaults = AppConfig::default();
        let config = AppConfig {
            relay_url: self.relay_url.clone(),
            callback_url: self.callback_url.clone(),
            session_timeout_secs: self.timeout_secs,
            app_name: self.app_name.clone().unwrap_or(defaults.app_name.clone()),
            chain_ids: self.chain_ids.clone(),
            preference: self.preference.into(),
            ..defaults
        };

        let state = AppState::init(ctx.config_path.clone(), Some(config))?;

        let chains = if state.config.chain_ids.is_empty() {
            "none (defaults to 1)".to_string()
        } else {
            state
                .config
                .chain_ids
                .iter()
                .map(u64::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        };

        let output = format!(
            "Initialized signlink directory at: {}\n\
             - Config: {}\n\
             - Storage: {}\n\
             - Relay: {}\n\
             - Callback: {}\n\
             - Chains: {}",
            state.signlink_dir.display(),
            state.config_path.display(),
            state.storage_path.display(),
            state.config.relay_url,
            state.config.callback_url,
            chains
        );

        Ok(output)
    }
}
