use std::time::Duration;
use std::{fs, path::PathBuf};

use common::communicator::CommunicatorConfig;
use common::message::{AppMetadata, Preference, PreferenceOption};
use common::signer::SessionConfig;
use serde::{Deserialize, Serialize};
use url::Url;

pub const APP_NAME: &str = "signlink";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const STORAGE_FILE_NAME: &str = "storage.json";

pub const DEFAULT_RELAY_URL: &str = "https://keys.coinbase.com/connect";
pub const DEFAULT_CALLBACK_URL: &str = "signlink://callback";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Relay the external session is pointed at
    #[serde(default = "default_relay_url")]
    pub relay_url: Url,
    /// Redirect target the relay returns to
    #[serde(default = "default_callback_url")]
    pub callback_url: Url,
    /// Seconds to wait for the external session; 0 waits forever
    #[serde(default = "default_session_timeout_secs")]
    pub session_timeout_secs: u64,
    /// Name shown to the user in the wallet
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default)]
    pub app_logo_url: Option<Url>,
    /// Chains the app works with; the first one is active at connect
    #[serde(default)]
    pub chain_ids: Vec<u64>,
    /// Which wallets the relay should offer
    #[serde(default)]
    pub preference: PreferenceOption,
    /// Default log directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Directory for daily log files (stderr only if not set)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_relay_url() -> Url {
    Url::parse(DEFAULT_RELAY_URL).expect("default relay url must parse")
}

fn default_callback_url() -> Url {
    Url::parse(DEFAULT_CALLBACK_URL).expect("default callback url must parse")
}

fn default_session_timeout_secs() -> u64 {
    300
}

fn default_app_name() -> String {
    APP_NAME.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            relay_url: default_relay_url(),
            callback_url: default_callback_url(),
            session_timeout_secs: default_session_timeout_secs(),
            app_name: default_app_name(),
            app_logo_url: None,
            chain_ids: Vec::new(),
            preference: PreferenceOption::default(),
            log_level: default_log_level(),
            log_dir: None,
        }
    }
}

impl AppConfig {
    pub fn session_timeout(&self) -> Option<Duration> {
        match self.session_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn communicator_config(&self) -> CommunicatorConfig {
        CommunicatorConfig::new(self.relay_url.clone(), self.callback_url.clone())
            .with_timeout(self.session_timeout())
    }

    pub fn session_config(&self) -> SessionConfig {
        let mut metadata =
            AppMetadata::new(self.app_name.clone()).with_chain_ids(self.chain_ids.clone());
        if let Some(logo) = &self.app_logo_url {
            metadata = metadata.with_logo(logo.clone());
        }
        SessionConfig::new(metadata).with_preference(Preference {
            options: self.preference,
        })
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    /// Path to the signlink directory (~/.signlink)
    pub signlink_dir: PathBuf,
    /// Path to the config file
    pub config_path: PathBuf,
    /// Path to the persisted signer choice
    pub storage_path: PathBuf,
    /// Loaded configuration
    pub config: AppConfig,
}

impl AppState {
    /// Get the signlink directory path (custom or default ~/.signlink)
    pub fn signlink_dir(custom_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        if let Some(path) = custom_path {
            return Ok(path);
        }

        let home = dirs::home_dir().ok_or(StateError::NoHomeDirectory)?;
        Ok(home.join(format!(".{}", APP_NAME)))
    }

    /// Initialize a new signlink state directory
    pub fn init(
        custom_path: Option<PathBuf>,
        config: Option<AppConfig>,
    ) -> Result<Self, StateError> {
        let signlink_dir = Self::signlink_dir(custom_path)?;

        if signlink_dir.exists() {
            return Err(StateError::AlreadyInitialized);
        }
        fs::create_dir_all(&signlink_dir)?;

        let config = config.unwrap_or_default();
        let config_path = signlink_dir.join(CONFIG_FILE_NAME);
        fs::write(&config_path, toml::to_string_pretty(&config)?)?;

        // The store treats a missing file as empty, it is created on first write
        let storage_path = signlink_dir.join(STORAGE_FILE_NAME);

        Ok(Self {
            signlink_dir,
            config_path,
            storage_path,
            config,
        })
    }

    /// Load existing state from the signlink directory
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        let signlink_dir = Self::signlink_dir(custom_path)?;

        if !signlink_dir.exists() {
            return Err(StateError::NotInitialized);
        }

        let config_path = signlink_dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            return Err(StateError::MissingFile(CONFIG_FILE_NAME.to_string()));
        }

        let config_toml = fs::read_to_string(&config_path)?;
        let config: AppConfig = toml::from_str(&config_toml)?;

        Ok(Self {
            storage_path: signlink_dir.join(STORAGE_FILE_NAME),
            signlink_dir,
            config_path,
            config,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("signlink directory not initialized. Run 'signlink init' first")]
    NotInitialized,

    #[error("signlink directory already initialized")]
    AlreadyInitialized,

    #[error("no home directory found")]
    NoHomeDirectory,

    #[error("missing required file: {0}")]
    MissingFile(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}
