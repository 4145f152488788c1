//! Client side of an upgraded WebSocket connection
//!
//! Messages can be pulled one at a time with [`ClientConnection::next`], or
//! consumed as a stream of [`StreamEvent`]s with [`ClientConnection::events`].
//! [`ClientConnection::text_sink`] and [`ClientConnection::data_sink`] feed
//! outgoing messages from any stream.

use crate::event::StreamEvent;
use bytes::Bytes;
use echosock_core::transport::TransportStream;
use echosock_core::{CloseCode, ConnectionState, Error, Message, Result, Session};
use futures_util::sink::{self, Sink};
use futures_util::stream::{self, BoxStream, StreamExt};
use echosock_transport_tcp::TcpStream;
use std::net::SocketAddr;
use std::pin::Pin;
use std::time::Instant;

/// Open client connection
pub struct ClientConnection {
    session: Session<TcpStream>,
    remote_addr: SocketAddr,
    local_addr: SocketAddr,
    metadata: ClientMetadata,
    events: EventProgress,
}

/// Which lifecycle events the event stream has already produced
#[derive(Debug, Default)]
struct EventProgress {
    connect_reported: bool,
    disconnect_reported: bool,
    closed_locally: bool,
}

/// Boxed sink returned by [`ClientConnection::text_sink`] and
/// [`ClientConnection::data_sink`]
pub type MessageSink<'a, T> = Pin<Box<dyn Sink<T, Error = Error> + Send + 'a>>;

impl std::fmt::Debug for ClientConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConnection")
            .field("remote_addr", &self.remote_addr)
            .field("local_addr", &self.local_addr)
            .field("state", &self.session.state())
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// Counters kept for a client connection
#[derive(Debug, Clone)]
pub struct ClientMetadata {
    /// Request target used for the upgrade
    pub path: String,
    /// When the upgrade completed
    pub connected_at: Instant,
    /// Data messages sent
    pub messages_sent: u64,
    /// Data messages received
    pub messages_received: u64,
}

impl ClientConnection {
    pub(crate) fn new(session: Session<TcpStream>, path: String) -> Result<Self> {
        let remote_addr = session.get_ref().remote_addr()?;
        let local_addr = session.get_ref().local_addr()?;

        Ok(Self {
            session,
            remote_addr,
            local_addr,
            metadata: ClientMetadata {
                path,
                connected_at: Instant::now(),
                messages_sent: 0,
                messages_received: 0,
            },
            events: EventProgress::default(),
        })
    }

    /// Get the remote address
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Get the local address
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Get the connection state
    pub fn state(&self) -> ConnectionState {
        self.session.state()
    }

    /// Check if messages can still be sent
    pub fn is_connected(&self) -> bool {
        self.session.is_open()
    }

    /// Get the connection metadata
    pub fn metadata(&self) -> &ClientMetadata {
        &self.metadata
    }

    /// Send a message
    pub async fn send(&mut self, message: Message) -> Result<()> {
        let is_data = message.is_data();
        self.session.send(message).await?;

        if is_data {
            self.metadata.messages_sent += 1;

            #[cfg(feature = "metrics")]
            metrics::counter!("echosock_client_messages_sent_total").increment(1);
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

    /// Receive the next message. `Ok(None)` means the connection is closed.
    pub async fn next(&mut self) -> Result<Option<Message>> {
        let message = self.session.next().await?;

        if matches!(&message, Some(m) if m.is_data()) {
            self.metadata.messages_received += 1;

            #[cfg(feature = "metrics")]
            metrics::counter!("echosock_client_messages_received_total").increment(1);
        }

        Ok(message)
    }

    /// Run the closing handshake and shut the stream down
    pub async fn close(&mut self, code: CloseCode, reason: &str) -> Result<()> {
        #[cfg(feature = "logging")]
        tracing::debug!("Closing connection to {} with {}", self.remote_addr, code);

        self.session.close(code, reason).await?;
        self.events.closed_locally = true;
        Ok(())
    }

    /// Next lifecycle or message event.
    ///
    /// The first call yields [`StreamEvent::Connect`]. After
    /// [`StreamEvent::Disconnect`] has been returned this yields `None`.
    /// A stream that ends without a close frame, or a read error, is
    /// reported as a disconnect carrying the error.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        if !self.events.connect_reported {
            self.events.connect_reported = true;
            return Some(StreamEvent::Connect);
        }
        if self.events.disconnect_reported {
            return None;
        }

        let event = loop {
            match self.next().await {
                Ok(Some(message)) => {
                    if let Some(event) = StreamEvent::from_message(message) {
                        break event;
                    }
                }
                Ok(None) if self.events.closed_locally => break StreamEvent::Disconnect(None),
                Ok(None) => break StreamEvent::Disconnect(Some(Error::ConnectionClosed)),
                Err(e) => break StreamEvent::Disconnect(Some(e)),
            }
        };

        if event.is_disconnect() {
            self.events.disconnect_reported = true;

            #[cfg(feature = "logging")]
            tracing::debug!("Disconnected from {}: {:?}", self.remote_addr, event);
        }
        Some(event)
    }

    /// Stream of [`StreamEvent`]s, ending after the disconnect.
    ///
    /// The stream borrows the connection. Dropping it between events loses
    /// nothing, so sending and listening can alternate.
    pub fn events(&mut self) -> BoxStream<'_, StreamEvent> {
        stream::unfold(self, |conn| async move {
            let event = conn.next_event().await?;
            Some((event, conn))
        })
        .boxed()
    }

    /// Sink that sends every item as a text message
    pub fn text_sink(&mut self) -> MessageSink<'_, String> {
        Box::pin(sink::unfold(self, |conn, text: String| async move {
            conn.send_text(text).await?;
            Ok::<_, Error>(conn)
        }))
    }

    /// Sink that sends every item as a binary message
    pub fn data_sink(&mut self) -> MessageSink<'_, Bytes> {
        Box::pin(sink::unfold(self, |conn, data: Bytes| async move {
            conn.send_binary(data).await?;
            Ok::<_, Error>(conn)
        }))
    }
}
