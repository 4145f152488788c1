//! WebSocket client implementation
//!
//! [`Client`] holds a parsed `ws://` URL and a [`ClientConfig`]. Calling
//! [`Client::connect`] opens the TCP stream, performs the upgrade and hands
//! back a [`ClientConnection`].

use crate::config::ClientConfig;
use crate::connection::ClientConnection;
use bytes::{Buf, BytesMut};
use echosock_core::error::{Error, ProtocolError, TimeoutError};
use echosock_core::handshake::{
    create_client_handshake, parse_server_handshake, validate_server_handshake, HandshakeConfig,
};
use echosock_core::protocol::constants::MAX_HEADER_SIZE;
use echosock_core::transport::TransportStream;
use echosock_core::{Result, Role, Session};
use echosock_transport_tcp::TcpStream;
use std::fmt;

const DEFAULT_PORT: u16 = 80;

/// Parsed `ws://` target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WsUrl {
    /// Host name or IP literal, without IPv6 brackets
    pub host: String,
    /// TCP port
    pub port: u16,
    /// Request target, always starting with `/`
    pub path: String,
}

impl WsUrl {
    /// Parse a `ws://host[:port][/path]` URL
    pub fn parse(url: &str) -> Result<Self> {
        let (scheme, rest) = url
            .split_once("://")
            .ok_or_else(|| ProtocolError::InvalidUrl(url.to_string()))?;

        if !scheme.eq_ignore_ascii_case("ws") {
            return Err(ProtocolError::UnsupportedScheme(scheme.to_string()).into());
        }

        let (authority, path) = match rest.find(|c: char| c == '/' || c == '?') {
            Some(idx) if rest[idx..].starts_with('/') => (&rest[..idx], rest[idx..].to_string()),
            Some(idx) => (&rest[..idx], format!("/{}", &rest[idx..])),
            None => (rest, "/".to_string()),
        };

        let invalid = || Error::from(ProtocolError::InvalidUrl(url.to_string()));

        let (host, port) = if let Some(bracketed) = authority.strip_prefix('[') {
            let (host, tail) = bracketed.split_once(']').ok_or_else(invalid)?;
            let port = match tail {
                "" => DEFAULT_PORT,
                _ => tail
                    .strip_prefix(':')
                    .and_then(|p| p.parse().ok())
                    .ok_or_else(invalid)?,
            };
            (host, port)
        } else {
            match authority.rsplit_once(':') {
                Some((host, port)) => (host, port.parse().map_err(|_| invalid())?),
                None => (authority, DEFAULT_PORT),
            }
        };

        if host.is_empty() || authority.contains('@') {
            return Err(invalid());
        }

        Ok(Self {
            host: host.to_string(),
            port,
            path,
        })
    }

    /// Value of the `Host` header
    pub fn host_header(&self) -> String {
        let host = if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };

        if self.port == DEFAULT_PORT {
            host
        } else {
            format!("{}:{}", host, self.port)
        }
    }
}

impl fmt::Display for WsUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ws://{}{}", self.host_header(), self.path)
    }
}

/// WebSocket client
#[derive(Debug, Clone)]
pub struct Client {
    url: WsUrl,
    config: ClientConfig,
}

impl Client {
    /// Create a client for a `ws://` URL
    pub fn new(url: &str) -> Result<Self> {
        Ok(Self {
            url: WsUrl::parse(url)?,
            config: ClientConfig::default(),
        })
    }

    /// Set client configuration
    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Target URL
    pub fn url(&self) -> &WsUrl {
        &self.url
    }

    /// Get the client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Connect and perform the upgrade handshake.
    ///
    /// The whole exchange, TCP connect included, is bounded by
    /// [`ClientConfig::handshake_timeout`].
    pub async fn connect(&self) -> Result<ClientConnection> {
        self.config.validate()?;

        let timeout = self.config.handshake_timeout;
        let session = tokio::time::timeout(timeout, self.establish())
            .await
            .map_err(|_| TimeoutError::Handshake { timeout })??;

        #[cfg(feature = "logging")]
        tracing::debug!("Connected to {}", self.url);

        #[cfg(feature = "metrics")]
        metrics::counter!("echosock_client_connections_total").increment(1);

        ClientConnection::new(session, self.url.path.clone())
    }

    async fn establish(&self) -> Result<Session<TcpStream>> {
        let mut last_error = None;
        let mut stream = None;

        for addr in tokio::net::lookup_host((self.url.host.as_str(), self.url.port)).await? {
            match TcpStream::connect(addr, self.config.nodelay).await {
                Ok(connected) => {
                    stream = Some(connected);
                    break;
                }
                Err(e) => last_error = Some(e),
            }
        }

        let mut stream = match (stream, last_error) {
            (Some(stream), _) => stream,
            (None, Some(e)) => return Err(e),
            (None, None) => return Err(ProtocolError::InvalidUrl(self.url.to_string()).into()),
        };

        let handshake_config = HandshakeConfig {
            host: Some(self.url.host_header()),
            origin: self.config.origin.clone(),
            user_agent: self.config.user_agent.clone(),
            extra_headers: self.config.headers.clone(),
        };
        let (request, key) = create_client_handshake(&self.url.path, &handshake_config)?;
        stream.write_all(&request.to_bytes()).await?;
        stream.flush().await?;

        let mut buffer = BytesMut::with_capacity(1024);
        let mut chunk = [0u8; 1024];
        let (response, header_len) = loop {
            if let Some(parsed) = parse_server_handshake(&buffer)? {
                break parsed;
            }

            if buffer.len() > MAX_HEADER_SIZE {
                return Err(ProtocolError::HeaderTooLarge {
                    size: buffer.len(),
                    max: MAX_HEADER_SIZE,
                }
                .into());
            }

            let n = stream.read(&mut chunk).await?;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }
            buffer.extend_from_slice(&chunk[..n]);
        };

        validate_server_handshake(&response, &key)?;
        buffer.advance(header_len);

        Ok(Session::new(stream, Role::Client)
            .with_max_message_size(self.config.max_message_size)
            .with_buffered(&buffer))
    }
}
