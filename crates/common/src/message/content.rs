use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::codec::HexBytes;

/// Which kind of signer the remote wallet drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignerType {
    /// Smart contract wallet reachable through the relay
    Scw,
    /// Legacy bridge-based wallet
    WalletLink,
    /// Injected browser extension
    Extension,
}

impl SignerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignerType::Scw => "scw",
            SignerType::WalletLink => "walletlink",
            SignerType::Extension => "extension",
        }
    }
}

impl fmt::Display for SignerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown signer type: {0}")]
pub struct UnknownSignerType(pub String);

impl FromStr for SignerType {
    type Err = UnknownSignerType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scw" => Ok(SignerType::Scw),
            "walletlink" => Ok(SignerType::WalletLink),
            "extension" => Ok(SignerType::Extension),
            other => Err(UnknownSignerType(other.to_string())),
        }
    }
}

/// Which wallets the remote side should offer the user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PreferenceOption {
    #[default]
    All,
    SmartWalletOnly,
    EoaOnly,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preference {
    pub options: PreferenceOption,
}

/// Metadata describing the requesting application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppMetadata {
    pub app_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_logo_url: Option<Url>,
    #[serde(default)]
    pub app_chain_ids: Vec<u64>,
}

impl AppMetadata {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            app_logo_url: None,
            app_chain_ids: Vec::new(),
        }
    }

    pub fn with_logo(mut self, logo: Url) -> Self {
        self.app_logo_url = Some(logo);
        self
    }

    pub fn with_chain_ids(mut self, chain_ids: Vec<u64>) -> Self {
        self.app_chain_ids = chain_ids;
        self
    }
}

/// The only action allowed in the clear: asking for accounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandshakeMethod {
    #[serde(rename = "eth_requestAccounts")]
    RequestAccounts,
}

/// Unencrypted first request of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeContent {
    pub method: HandshakeMethod,
    pub params: AppMetadata,
}

impl HandshakeContent {
    pub fn request_accounts(metadata: AppMetadata) -> Self {
        Self {
            method: HandshakeMethod::RequestAccounts,
            params: metadata,
        }
    }
}

/// An authenticated ciphertext and the nonce it was sealed under
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedContent {
    pub iv: HexBytes,
    pub cipher_text: HexBytes,
}

/// Control events exchanged before any key exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConfigEvent {
    SelectSignerType,
}

/// Unencrypted negotiation message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigContent {
    pub event: ConfigEvent,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl ConfigContent {
    pub fn select_signer_type(preference: &Preference) -> Self {
        Self {
            event: ConfigEvent::SelectSignerType,
            data: serde_json::to_value(preference).unwrap_or_default(),
        }
    }

    pub fn signer_type_answer(signer_type: SignerType) -> Self {
        Self {
            event: ConfigEvent::SelectSignerType,
            data: serde_json::Value::String(signer_type.as_str().to_string()),
        }
    }

    /// Interpret `data` as the relay's signer-type answer
    pub fn signer_type(&self) -> Result<SignerType, UnknownSignerType> {
        match &self.data {
            serde_json::Value::String(s) => s.parse(),
            other => Err(UnknownSignerType(other.to_string())),
        }
    }
}
