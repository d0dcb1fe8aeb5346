//! Adapter settings.
//!
//! Settings live in a single `config.toml` file at
//! `~/.config/calbridge/config.toml` by default:
//!
//! ```toml
//! [account]
//! address = "user@example.com"
//! secret = "pass::work/exchange"
//! # endpoint = "https://mail.example.com/EWS/Exchange.asmx"
//!
//! [http]
//! timeout_secs = 30
//! verify_tls = true
//! server_version = "Exchange2010_SP2"
//!
//! [log]
//! level = "info"
//! format = "compact"
//! ```
//!
//! Without `endpoint` the endpoint is discovered from the address. The
//! secret supports the references handled by [`crate::secret`].

use std::path::{Path, PathBuf};

use calbridge_core::LogSettings;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::AdapterError;
#[cfg(feature = "ews")]
use crate::remote::TransportError;

/// Errors raised while loading settings or building an adapter from them.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("[account] section is missing from config.toml")]
    MissingAccount,

    #[error("secret resolution failed: {0}")]
    Secret(String),

    #[cfg(feature = "ews")]
    #[error("failed to create EWS backend: {0}")]
    Backend(#[source] TransportError),

    #[error(transparent)]
    Session(#[from] AdapterError),
}

/// Top-level settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterSettings {
    /// Mailbox account.
    pub account: Option<AccountSettings>,

    /// HTTP transport settings.
    pub http: HttpSettings,

    /// Log output, see [`calbridge_core::tracing::init`].
    pub log: LogSettings,
}

/// The `[account]` section.
#[derive(Clone, Serialize, Deserialize)]
pub struct AccountSettings {
    /// Mailbox address, also used as the login name.
    pub address: String,

    /// Secret or secret reference.
    pub secret: String,

    /// Explicit EWS endpoint; discovered when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl AccountSettings {
    /// Resolves the secret reference.
    pub fn resolve_secret(&self) -> Result<String, ConfigError> {
        crate::secret::resolve(&self.secret)
    }
}

impl std::fmt::Debug for AccountSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let secret = if self.secret.starts_with("pass::") || self.secret.starts_with("env::") {
            self.secret.as_str()
        } else {
            "<redacted>"
        };
        f.debug_struct("AccountSettings")
            .field("address", &self.address)
            .field("secret", &secret)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// The `[http]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Request timeout in seconds.
    pub timeout_secs: u64,

    /// Whether to verify TLS certificates.
    pub verify_tls: bool,

    /// User agent override.
    pub user_agent: Option<String>,

    /// Requested schema version override.
    pub server_version: Option<String>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            verify_tls: true,
            user_agent: None,
            server_version: None,
        }
    }
}

#[cfg(feature = "ews")]
impl HttpSettings {
    /// Builds the transport configuration.
    pub fn to_ews_config(&self) -> crate::ews::EwsConfig {
        let mut config = crate::ews::EwsConfig::new()
            .with_timeout(std::time::Duration::from_secs(self.timeout_secs));
        if !self.verify_tls {
            config = config.with_insecure_tls();
        }
        if let Some(user_agent) = &self.user_agent {
            config = config.with_user_agent(user_agent);
        }
        if let Some(version) = &self.server_version {
            config = config.with_server_version(version);
        }
        config
    }
}

impl AdapterSettings {
    /// Loads settings from the default path, or defaults if it does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads settings from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("calbridge")
    }

    /// Returns the account section.
    pub fn account(&self) -> Result<&AccountSettings, ConfigError> {
        self.account.as_ref().ok_or(ConfigError::MissingAccount)
    }
}

#[cfg(feature = "ews")]
impl crate::operations::CalendarAdapter {
    /// Builds an EWS adapter with a ready session.
    ///
    /// Resolves the secret, creates the session, then sets the configured
    /// endpoint or discovers one from the account address.
    pub async fn from_settings(settings: &AdapterSettings) -> Result<Self, ConfigError> {
        let account = settings.account()?;
        let secret = account.resolve_secret()?;
        let backend = crate::ews::EwsBackend::new(settings.http.to_ews_config())
            .map_err(ConfigError::Backend)?;

        let mut adapter = Self::new(std::sync::Arc::new(backend));
        adapter.create_session(&account.address, &secret)?;
        match &account.endpoint {
            Some(endpoint) => adapter.set_endpoint(endpoint)?,
            None => {
                adapter.resolve_endpoint(&account.address).await?;
            }
        }
        Ok(adapter)
    }
}
