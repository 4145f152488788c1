//! Client configuration for echosock

use echosock_core::error::ConfigError;
use echosock_core::protocol::constants::DEFAULT_HANDSHAKE_TIMEOUT;
use echosock_core::Error;
use std::time::Duration;

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Time allowed for the TCP connect plus the upgrade handshake
    pub handshake_timeout: Duration,
    /// Maximum size of an incoming message. `None` means unlimited.
    pub max_message_size: Option<usize>,
    /// User agent string
    pub user_agent: Option<String>,
    /// Origin header
    pub origin: Option<String>,
    /// Custom headers
    pub headers: Vec<(String, String)>,
    /// Set `TCP_NODELAY` on the socket
    pub nodelay: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            max_message_size: None,
            user_agent: Some(format!("echosock-client/{}", env!("CARGO_PKG_VERSION"))),
            origin: None,
            headers: Vec::new(),
            nodelay: true,
        }
    }
}

impl ClientConfig {
    /// Validate the configuration
    pub fn validate(&self) -> echosock_core::Result<()> {
        if self.handshake_timeout.is_zero() {
            return Err(Error::Config(ConfigError::Validation(
                "handshake_timeout must be greater than 0".to_string(),
            )));
        }

        if self.max_message_size == Some(0) {
            return Err(Error::Config(ConfigError::Validation(
                "max_message_size must be greater than 0".to_string(),
            )));
        }

        if let Some((name, _)) = self.headers.iter().find(|(name, _)| name.trim().is_empty()) {
            return Err(Error::Config(ConfigError::InvalidValue {
                field: "headers".to_string(),
                value: format!("{name:?}"),
            }));
        }

        Ok(())
    }

    /// Set handshake timeout
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set maximum message size
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = Some(size);
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Set origin
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Add a custom header
    pub fn add_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Enable or disable `TCP_NODELAY`
    pub fn nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.handshake_timeout, Duration::from_secs(10));
        assert_eq!(config.max_message_size, None);
        assert!(config
            .user_agent
            .as_deref()
            .unwrap()
            .starts_with("echosock-client/"));
    }

    #[test]
    fn test_client_config_validation() {
        let config = ClientConfig::default().handshake_timeout(Duration::ZERO);
        assert!(config.validate().is_err());

        let config = ClientConfig::default().max_message_size(0);
        assert!(config.validate().is_err());

        let config = ClientConfig::default().add_header(" ", "value");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_client_config_builder() {
        let config = ClientConfig::default()
            .user_agent("test-agent")
            .origin("http://localhost")
            .add_header("X-Custom", "value")
            .nodelay(false);

        assert_eq!(config.user_agent.as_deref(), Some("test-agent"));
        assert_eq!(config.origin.as_deref(), Some("http://localhost"));
        assert_eq!(
            config.headers[0],
            ("X-Custom".to_string(), "value".to_string())
        );
        assert!(!config.nodelay);
    }
}
