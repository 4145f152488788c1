//! Push-style view of a client connection
//!
//! [`ClientConnection::events`](crate::ClientConnection::events) turns the
//! connection into a stream of [`StreamEvent`]s: one `Connect`, then every
//! text, binary and pong message, then exactly one `Disconnect`.

use bytes::Bytes;
use echosock_core::{CloseFrame, Error, Message};

/// Something that happened on a client connection
#[derive(Debug)]
pub enum StreamEvent {
    /// The upgrade completed and the connection is open
    Connect,
    /// The connection ended. `None` for a clean close (1000 or 1001 from
    /// the peer, or a close we started), otherwise the reason.
    Disconnect(Option<Error>),
    /// Answer to one of our pings
    Pong(Bytes),
    /// Text message from the server
    Text(String),
    /// Binary message from the server
    Data(Bytes),
}

impl StreamEvent {
    /// Whether this is the last event of the stream
    pub fn is_disconnect(&self) -> bool {
        matches!(self, StreamEvent::Disconnect(_))
    }

    /// Event for a received message. Pings are answered by the session and
    /// produce no event.
    pub(crate) fn from_message(message: Message) -> Option<Self> {
        match message {
            Message::Text(text) => Some(StreamEvent::Text(text)),
            Message::Binary(data) => Some(StreamEvent::Data(data)),
            Message::Pong(data) => Some(StreamEvent::Pong(data)),
            Message::Ping(_) => None,
            Message::Close(close) => Some(StreamEvent::Disconnect(close_error(close))),
        }
    }
}

fn close_error(close: Option<CloseFrame>) -> Option<Error> {
    match close {
        Some(frame) if frame.code.is_error() => Some(Error::PeerClosed(frame)),
        _ => None,
    }
}
