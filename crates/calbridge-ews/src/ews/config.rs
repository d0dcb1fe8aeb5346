//! EWS transport configuration.

use std::time::Duration;

/// Configuration for the EWS transport.
#[derive(Debug, Clone)]
pub struct EwsConfig {
    /// Whether to verify TLS certificates.
    pub verify_tls: bool,

    /// Request timeout.
    pub timeout: Duration,

    /// User agent string.
    pub user_agent: String,

    /// Schema version sent in `RequestServerVersion`.
    pub server_version: String,

    /// Redirections followed during autodiscover before giving up.
    pub max_autodiscover_hops: usize,
}

impl EwsConfig {
    /// Default timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Default requested schema version.
    pub const DEFAULT_SERVER_VERSION: &'static str = "Exchange2010_SP2";

    /// Default autodiscover redirection limit.
    pub const DEFAULT_MAX_AUTODISCOVER_HOPS: usize = 10;

    pub fn new() -> Self {
        Self {
            verify_tls: true,
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            user_agent: format!("calbridge/{}", env!("CARGO_PKG_VERSION")),
            server_version: Self::DEFAULT_SERVER_VERSION.to_string(),
            max_autodiscover_hops: Self::DEFAULT_MAX_AUTODISCOVER_HOPS,
        }
    }

    /// Disables TLS verification (for testing only).
    pub fn with_insecure_tls(mut self) -> Self {
        self.verify_tls = false;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the requested schema version, e.g. `Exchange2013`.
    pub fn with_server_version(mut self, version: impl Into<String>) -> Self {
        self.server_version = version.into();
        self
    }

    pub fn with_max_autodiscover_hops(mut self, hops: usize) -> Self {
        self.max_autodiscover_hops = hops;
        self
    }
}

impl Default for EwsConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EwsConfig::default();
        assert!(config.verify_tls);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.server_version, "Exchange2010_SP2");
        assert_eq!(config.max_autodiscover_hops, 10);
        assert!(config.user_agent.starts_with("calbridge/"));
    }

    #[test]
    fn builder_methods() {
        let config = EwsConfig::new()
            .with_insecure_tls()
            .with_timeout(Duration::from_secs(5))
            .with_user_agent("host/1.0")
            .with_server_version("Exchange2013")
            .with_max_autodiscover_hops(2);

        assert!(!config.verify_tls);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.user_agent, "host/1.0");
        assert_eq!(config.server_version, "Exchange2013");
        assert_eq!(config.max_autodiscover_hops, 2);
    }
}
