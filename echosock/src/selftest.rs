//! Startup self-test
//!
//! Connects to the freshly bound server as an ordinary client, sends one
//! text message and expects it back. The whole exchange runs under a single
//! deadline; when it expires the in-flight connect, send or receive is
//! dropped.

use echosock_client::{Client, ClientConnection};
use echosock_core::{CloseCode, Message};
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};

/// Message the self-test sends
pub const DEFAULT_PAYLOAD: &str = "hello";

/// Deadline for the whole self-test
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Ways the self-test can fail
#[derive(Debug, thiserror::Error)]
pub enum SelfTestError {
    /// No reply within the deadline
    #[error("no reply within {0:?}")]
    Timeout(Duration),

    /// The server closed the connection without replying
    #[error("server closed the connection before replying")]
    NoReply,

    /// The reply differs from what was sent
    #[error("expected {expected:?}, got {received}")]
    Mismatch {
        /// Payload that was sent
        expected: String,
        /// Message that came back
        received: Message,
    },

    /// Connecting or exchanging messages failed
    #[error("client error: {0}")]
    Client(#[from] echosock_core::Error),
}

/// Result of a passing self-test
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfTestReport {
    /// Text the server sent back
    pub reply: String,
    /// Time from starting the connect to receiving the reply
    pub round_trip: Duration,
}

impl fmt::Display for SelfTestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "received {:?} in {:?}", self.reply, self.round_trip)
    }
}

/// One-shot echo check against a running server
#[derive(Debug, Clone)]
pub struct SelfTest {
    target: SocketAddr,
    payload: String,
    timeout: Duration,
}

impl SelfTest {
    /// Self-test against `127.0.0.1:<port>`
    pub fn new(port: u16) -> Self {
        Self::for_addr(SocketAddr::from((Ipv4Addr::LOCALHOST, port)))
    }

    /// Self-test against an arbitrary address
    pub fn for_addr(target: SocketAddr) -> Self {
        Self {
            target,
            payload: DEFAULT_PAYLOAD.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the text to send
    pub fn payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Set the deadline
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Address the self-test connects to
    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// URL the self-test connects to
    pub fn url(&self) -> String {
        format!("ws://{}/", self.target)
    }

    /// Run the self-test once. There is no retry.
    pub async fn run(&self) -> Result<SelfTestReport, SelfTestError> {
        let started = Instant::now();

        let reply = tokio::time::timeout(self.timeout, self.exchange())
            .await
            .map_err(|_| SelfTestError::Timeout(self.timeout))??;

        Ok(SelfTestReport {
            reply,
            round_trip: started.elapsed(),
        })
    }

    async fn exchange(&self) -> Result<String, SelfTestError> {
        let mut conn = Client::new(&self.url())?.connect().await?;
        tracing::debug!("Self-test connected to {}", self.target);

        conn.send_text(self.payload.as_str()).await?;
        let reply = next_data_message(&mut conn).await?;

        if let Err(e) = conn.close(CloseCode::Normal, "").await {
            tracing::debug!("Self-test close did not complete cleanly: {}", e);
        }

        match reply {
            Some(Message::Text(text)) if text == self.payload => Ok(text),
            Some(other) => Err(SelfTestError::Mismatch {
                expected: self.payload.clone(),
                received: other,
            }),
            None => Err(SelfTestError::NoReply),
        }
    }
}

/// Next text or binary message, skipping pings and pongs. A close frame or
/// the end of the stream gives `None`.
async fn next_data_message(
    conn: &mut ClientConnection,
) -> Result<Option<Message>, echosock_core::Error> {
    while let Some(message) = conn.next().await? {
        match message {
            Message::Ping(_) | Message::Pong(_) => continue,
            Message::Close(_) => return Ok(None),
            data => return Ok(Some(data)),
        }
    }
    Ok(None)
}
