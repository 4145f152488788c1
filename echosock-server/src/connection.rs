//! WebSocket connection handling
//!
//! A [`Connection`] is handed to the [`Handler`](crate::handler::Handler)
//! once the upgrade has completed. It wraps the protocol session with the
//! peer's addresses and a few counters.

use bytes::Bytes;
use echosock_core::{
    transport::TransportStream, CloseCode, ConnectionState, Message, Result, Session,
};
use std::net::SocketAddr;
use std::time::Instant;

/// Server side of an upgraded WebSocket connection
pub struct Connection {
    session: Session<Box<dyn TransportStream>>,
    remote_addr: SocketAddr,
    local_addr: SocketAddr,
    /// Connection metadata
    pub metadata: ConnectionMetadata,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("remote_addr", &self.remote_addr)
            .field("local_addr", &self.local_addr)
            .field("state", &self.session.state())
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// Connection metadata
#[derive(Debug, Clone)]
pub struct ConnectionMetadata {
    /// Request target of the upgrade request
    pub path: String,
    /// Connection established time
    pub established_at: Instant,
    /// Messages sent count
    pub messages_sent: u64,
    /// Messages received count
    pub messages_received: u64,
    /// Payload bytes sent count
    pub bytes_sent: u64,
    /// Payload bytes received count
    pub bytes_received: u64,
}

impl ConnectionMetadata {
    fn new(path: String) -> Self {
        Self {
            path,
            established_at: Instant::now(),
            messages_sent: 0,
            messages_received: 0,
            bytes_sent: 0,
            bytes_received: 0,
        }
    }
}

impl Connection {
    /// Wrap an open server session
    pub fn new(
        session: Session<Box<dyn TransportStream>>,
        remote_addr: SocketAddr,
        local_addr: SocketAddr,
        path: impl Into<String>,
    ) -> Self {
        Self {
            session,
            remote_addr,
            local_addr,
            metadata: ConnectionMetadata::new(path.into()),
        }
    }

    /// Get the remote address
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Get the local address
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Request target the client connected to
    pub fn path(&self) -> &str {
        &self.metadata.path
    }

    /// Get the connection state
    pub fn state(&self) -> ConnectionState {
        self.session.state()
    }

    /// Whether messages can still be sent
    pub fn is_open(&self) -> bool {
        self.session.is_open()
    }

    /// Get the connection metadata
    pub fn metadata(&self) -> &ConnectionMetadata {
        &self.metadata
    }

    /// Receive the next message. `Ok(None)` means the connection is closed.
    pub async fn next(&mut self) -> Result<Option<Message>> {
        let message = self.session.next().await?;

        if let Some(message) = &message {
            if message.is_data() {
                self.metadata.messages_received += 1;
                self.metadata.bytes_received += message.len() as u64;

                #[cfg(feature = "metrics")]
                {
                    metrics::counter!("echosock_server_messages_received_total").increment(1);
                    metrics::counter!("echosock_server_bytes_received_total")
                        .increment(message.len() as u64);
                }
            }
        }

        Ok(message)
    }

    /// Send a message
    pub async fn send(&mut self, message: Message) -> Result<()> {
        let is_data = message.is_data();
        let len = message.len() as u64;

        self.session.send(message).await?;

        if is_data {
            self.metadata.messages_sent += 1;
            self.metadata.bytes_sent += len;

            #[cfg(feature = "metrics")]
            {
                metrics::counter!("echosock_server_messages_sent_total").increment(1);
                metrics::counter!("echosock_server_bytes_sent_total").increment(len);
            }
        }

        Ok(())
    }

    /// Send a text message
    pub async fn send_text(&mut self, text: impl Into<String>) -> Result<()> {
        self.send(Message::text(text)).await
    }

    /// Send a binary message
    pub async fn send_binary(&mut self, data: impl Into<Bytes>) -> Result<()> {
        self.send(Message::binary(data)).await
    }

    /// Send a ping
    pub async fn ping(&mut self, data: impl Into<Bytes>) -> Result<()> {
        self.send(Message::Ping(data.into())).await
    }

    /// Run the closing handshake
    pub async fn close(&mut self, code: CloseCode, reason: &str) -> Result<()> {
        self.session.close(code, reason).await
    }

    /// Shut down the TCP stream without a closing handshake
    pub async fn shutdown(&mut self) -> Result<()> {
        self.session.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use echosock_core::{Frame, IoStream, Role};
    use tokio_test::io::Builder;

    fn connection(mock: tokio_test::io::Mock) -> Connection {
        let stream: Box<dyn TransportStream> = Box::new(IoStream::new(mock));
        Connection::new(
            Session::new(stream, Role::Server),
            "127.0.0.1:40000".parse().unwrap(),
            "127.0.0.1:8080".parse().unwrap(),
            "/chat",
        )
    }

    #[tokio::test]
    async fn test_metadata_counts_data_messages() {
        let mock = Builder::new()
            .read(&Frame::text("abc").masked([1, 2, 3, 4]).to_bytes())
            .read(&Frame::ping("p").masked([1, 2, 3, 4]).to_bytes())
            .write(b"\x8a\x01p")
            .write(b"\x81\x03abc")
            .build();
        let mut conn = connection(mock);
        assert_eq!(conn.path(), "/chat");

        let text = conn.next().await.unwrap().unwrap();
        assert!(matches!(conn.next().await.unwrap(), Some(Message::Ping(_))));
        conn.send(text).await.unwrap();

        assert_eq!(conn.metadata().messages_received, 1);
        assert_eq!(conn.metadata().bytes_received, 3);
        assert_eq!(conn.metadata().messages_sent, 1);
        assert_eq!(conn.metadata().bytes_sent, 3);
    }
}
