//! WebSocket server implementation
//!
//! [`Server::bind`] opens the listening socket up front so bind failures
//! surface before any serving starts. The resulting [`BoundServer`] accepts
//! connections forever, running the upgrade handshake and the handler for
//! each one on its own task.

use crate::config::ServerConfig;
use crate::connection::Connection;
use crate::error::{HandshakeError, Result, ServerError};
use crate::handler::{BoxedHandler, EchoHandler, Handler};
use bytes::{Buf, BytesMut};
use echosock_core::error::{ConfigError, Error, ProtocolError};
use echosock_core::handshake::{
    create_rejection, create_server_handshake, parse_client_handshake,
    validate_client_handshake, HandshakeRequest,
};
use echosock_core::protocol::constants::MAX_HEADER_SIZE;
use echosock_core::transport::{Transport, TransportStream};
use echosock_core::{Role, Session};
use echosock_transport_tcp::{TcpStream, TcpTransport};
use std::future::Future;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use tokio::time::{sleep, timeout, Duration};

/// Pause after a failed accept so persistent errors such as running out of
/// file descriptors do not spin the loop
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// WebSocket server, configured but not yet listening
pub struct Server {
    config: ServerConfig,
    handler: BoxedHandler,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("handler", &"<handler>")
            .finish()
    }
}

impl Server {
    /// Create a new server
    pub fn new(config: ServerConfig, handler: BoxedHandler) -> Self {
        Self { config, handler }
    }

    /// Create a server builder
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind the listening socket
    pub async fn bind(self) -> Result<BoundServer> {
        let addr = self.config.bind_address;
        let transport = TcpTransport::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?
            .with_nodelay(self.config.nodelay);
        let local_addr = transport.local_addr()?;

        crate::log_info!("Listening on ws://{}", local_addr);

        Ok(BoundServer {
            transport,
            local_addr,
            config: Arc::new(self.config),
            handler: self.handler,
        })
    }

    /// Bind and serve until the process ends
    pub async fn serve(self) -> Result<()> {
        self.bind().await?.serve().await
    }

    /// Bind and serve until `shutdown_signal` resolves
    pub async fn serve_with_graceful_shutdown<F>(self, shutdown_signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        self.bind()
            .await?
            .serve_with_graceful_shutdown(shutdown_signal)
            .await
    }
}

/// A server whose listening socket is open
pub struct BoundServer {
    transport: TcpTransport,
    local_addr: SocketAddr,
    config: Arc<ServerConfig>,
    handler: BoxedHandler,
}

impl std::fmt::Debug for BoundServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundServer")
            .field("local_addr", &self.local_addr)
            .field("config", &self.config)
            .finish()
    }
}

impl BoundServer {
    /// Address the listener is bound to, with the real port when port 0
    /// was requested
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections forever
    pub async fn serve(self) -> Result<()> {
        self.serve_with_graceful_shutdown(std::future::pending()).await
    }

    /// Accept connections until `shutdown_signal` resolves.
    ///
    /// Connections already accepted keep running on their own tasks.
    pub async fn serve_with_graceful_shutdown<F>(self, shutdown_signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        tokio::pin!(shutdown_signal);
        let mut connection_counter = 0u64;

        loop {
            tokio::select! {
                result = self.transport.accept() => {
                    match result {
                        Ok(stream) => {
                            connection_counter += 1;
                            let remote_addr = match stream.remote_addr() {
                                Ok(addr) => addr,
                                Err(e) => {
                                    crate::log_error!("Failed to get remote address: {}", e);
                                    continue;
                                }
                            };
                            crate::log_debug!(
                                "Accepted connection #{} from {}",
                                connection_counter,
                                remote_addr
                            );

                            let handler = self.handler.clone();
                            let config = Arc::clone(&self.config);
                            tokio::spawn(async move {
                                match handle_connection(stream, handler, config).await {
                                    Ok(()) => {}
                                    Err(ServerError::Handshake(e)) => {
                                        crate::log_warn!("Handshake with {} failed: {}", remote_addr, e);
                                    }
                                    Err(e) => {
                                        crate::log_error!("Connection error for {}: {}", remote_addr, e);
                                    }
                                }
                            });
                        }
                        Err(e) => {
                            crate::log_error!("{}", ServerError::Accept(e));
                            sleep(ACCEPT_ERROR_BACKOFF).await;
                        }
                    }
                }
                _ = &mut shutdown_signal => {
                    crate::log_info!("Shutdown signal received, no longer accepting connections");
                    break;
                }
            }
        }

        Ok(())
    }
}

/// Handshake, handler and teardown for one accepted stream
async fn handle_connection(
    mut stream: TcpStream,
    handler: BoxedHandler,
    config: Arc<ServerConfig>,
) -> Result<()> {
    let remote_addr = stream.remote_addr()?;
    let local_addr = stream.local_addr()?;

    let (request, leftover) = match perform_handshake(&mut stream, &config).await {
        Ok(upgraded) => upgraded,
        Err(e) => {
            if let Some(status) = e.status() {
                let response = create_rejection(status, &e.to_string());
                let _ = stream.write_all(&response.to_bytes()).await;
                let _ = stream.flush().await;
            }
            let _ = stream.close().await;
            return Err(e.into());
        }
    };

    crate::log_debug!(
        "WebSocket connection established with {} on {}",
        remote_addr,
        request.path
    );

    #[cfg(feature = "metrics")]
    metrics::counter!("echosock_server_connections_opened_total").increment(1);

    let boxed_stream: Box<dyn TransportStream> = Box::new(stream);
    let session = Session::new(boxed_stream, Role::Server)
        .with_max_message_size(config.max_message_size)
        .with_buffered(&leftover);
    let mut connection = Connection::new(session, remote_addr, local_addr, request.path);

    let result = handler.handle(&mut connection).await;
    let _ = connection.shutdown().await;

    #[cfg(feature = "metrics")]
    metrics::counter!("echosock_server_connections_closed_total").increment(1);

    crate::log_debug!(
        "Connection with {} finished after {} messages",
        remote_addr,
        connection.metadata().messages_received
    );

    result.map_err(ServerError::Core)
}

/// Read, validate and answer the upgrade request.
///
/// Returns the request and any bytes the client sent after it.
async fn perform_handshake(
    stream: &mut TcpStream,
    config: &ServerConfig,
) -> std::result::Result<(HandshakeRequest, BytesMut), HandshakeError> {
    let (request, leftover) = timeout(config.handshake_timeout, read_handshake_request(stream))
        .await
        .map_err(|_| HandshakeError::Timeout(config.handshake_timeout))??;

    let key = validate_client_handshake(&request).map_err(HandshakeError::rejected)?;
    let response = create_server_handshake(&key).map_err(HandshakeError::rejected)?;

    stream
        .write_all(&response.to_bytes())
        .await
        .map_err(HandshakeError::Io)?;
    stream.flush().await.map_err(HandshakeError::Io)?;

    Ok((request, leftover))
}

/// Read until a complete request head is buffered
async fn read_handshake_request(
    stream: &mut TcpStream,
) -> std::result::Result<(HandshakeRequest, BytesMut), HandshakeError> {
    let mut buffer = BytesMut::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    loop {
        if let Some((request, header_len)) =
            parse_client_handshake(&buffer).map_err(HandshakeError::rejected)?
        {
            buffer.advance(header_len);
            return Ok((request, buffer));
        }

        if buffer.len() > MAX_HEADER_SIZE {
            return Err(HandshakeError::rejected(
                ProtocolError::HeaderTooLarge {
                    size: buffer.len(),
                    max: MAX_HEADER_SIZE,
                }
                .into(),
            ));
        }

        let n = stream.read(&mut chunk).await.map_err(HandshakeError::Io)?;
        if n == 0 {
            return Err(HandshakeError::ConnectionClosed);
        }
        buffer.extend_from_slice(&chunk[..n]);
    }
}

/// Server builder
#[derive(Debug)]
pub struct ServerBuilder {
    config: ServerConfig,
}

impl ServerBuilder {
    /// Create a new server builder
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Bind to the given address
    pub fn bind<A: ToSocketAddrs>(mut self, addr: A) -> echosock_core::Result<Self> {
        self.config.bind_address = addr.to_socket_addrs()?.next().ok_or_else(|| {
            Error::Config(ConfigError::Validation("Invalid bind address".to_string()))
        })?;
        Ok(self)
    }

    /// Set handshake timeout
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    /// Set maximum message size
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.config.max_message_size = Some(size);
        self
    }

    /// Enable or disable `TCP_NODELAY`
    pub fn nodelay(mut self, nodelay: bool) -> Self {
        self.config.nodelay = nodelay;
        self
    }

    /// Build an echo server
    pub fn build(self) -> echosock_core::Result<Server> {
        self.build_with_handler(EchoHandler::new())
    }

    /// Build the server with a custom handler
    pub fn build_with_handler<H>(self, handler: H) -> echosock_core::Result<Server>
    where
        H: Handler,
    {
        self.config.validate()?;

        Ok(Server::new(self.config, Box::new(handler)))
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
