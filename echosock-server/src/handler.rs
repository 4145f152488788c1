//! WebSocket connection handlers
//!
//! A handler owns an upgraded [`Connection`] for its whole lifetime. The
//! server runs one handler call per connection, each on its own task.

use crate::connection::Connection;
use echosock_core::{Message, Result};
use std::future::Future;
use std::pin::Pin;

/// Trait for handling WebSocket connections
pub trait Handler: Send + Sync + 'static {
    /// Drive a connection until it closes
    fn handle<'a>(
        &'a self,
        connection: &'a mut Connection,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    /// Clone the handler
    fn clone_box(&self) -> Box<dyn Handler>;
}

impl Clone for Box<dyn Handler> {
    fn clone(&self) -> Box<dyn Handler> {
        self.clone_box()
    }
}

/// Boxed handler type
pub type BoxedHandler = Box<dyn Handler>;

/// Sends every text and binary message straight back to its sender.
///
/// Pings are already answered by the session, so control messages need no
/// work here. The loop ends when the peer closes or the stream ends.
#[derive(Debug, Clone, Default)]
pub struct EchoHandler;

impl EchoHandler {
    /// Create a new echo handler
    pub fn new() -> Self {
        Self
    }
}

impl Handler for EchoHandler {
    fn handle<'a>(
        &'a self,
        conn: &'a mut Connection,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            while let Some(msg) = conn.next().await? {
                match msg {
                    Message::Text(_) | Message::Binary(_) => {
                        crate::log_trace!(
                            "Echoing {:?} message of {} bytes to {}",
                            msg.kind(),
                            msg.len(),
                            conn.remote_addr()
                        );
                        conn.send(msg).await?;
                    }
                    Message::Ping(_) | Message::Pong(_) => {}
                    Message::Close(close) => {
                        crate::log_debug!(
                            "Peer {} closed the connection: {:?}",
                            conn.remote_addr(),
                            close
                        );
                        break;
                    }
                }
            }

            Ok(())
        })
    }

    fn clone_box(&self) -> Box<dyn Handler> {
        Box::new(self.clone())
    }
}
