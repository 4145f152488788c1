//! Server configuration

use echosock_core::error::{ConfigError, Error};
use echosock_core::protocol::constants::DEFAULT_HANDSHAKE_TIMEOUT;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address
    pub bind_address: SocketAddr,
    /// Time a client has to complete its upgrade request
    pub handshake_timeout: Duration,
    /// Maximum size of an incoming message. `None` means unlimited.
    pub max_message_size: Option<usize>,
    /// Set `TCP_NODELAY` on accepted connections
    pub nodelay: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from((Ipv4Addr::LOCALHOST, 8080)),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            max_message_size: None,
            nodelay: true,
        }
    }
}

impl ServerConfig {
    /// Validate the configuration
    pub fn validate(&self) -> echosock_core::Result<()> {
        if self.handshake_timeout.is_zero() {
            return Err(Error::Config(ConfigError::Validation(
                "handshake_timeout must be greater than 0".to_string(),
            )));
        }

        if self.max_message_size == Some(0) {
            return Err(Error::Config(ConfigError::InvalidValue {
                field: "max_message_size".to_string(),
                value: "0".to_string(),
            }));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.handshake_timeout, Duration::from_secs(10));
        assert_eq!(config.max_message_size, None);
        assert!(config.nodelay);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let config = ServerConfig {
            handshake_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ServerConfig {
            max_message_size: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(Error::Config(ConfigError::InvalidValue { .. }))
        ));
    }
}
