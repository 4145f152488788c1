//! Per-connection protocol state machine
//!
//! A [`Session`] owns an upgraded stream and speaks RFC 6455 over it for one
//! [`Role`]. It validates and reassembles incoming frames, answers pings,
//! runs the closing handshake and fails the connection with the right close
//! code when the peer breaks the protocol.

use crate::error::{CloseCode, Error, FrameError, ProtocolError, Result};
use crate::frame::{Frame, FrameParser};
use crate::message::{CloseFrame, Message, MessageAssembler};
use crate::protocol::constants::{MAX_CONTROL_PAYLOAD, READ_BUFFER_SIZE};
use crate::protocol::Role;
use crate::transport::TransportStream;
use std::fmt;

/// Lifecycle of a WebSocket connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Upgrade handshake in progress
    Connecting,
    /// Messages flow in both directions
    Open,
    /// Our close frame is sent, waiting for the peer's
    Closing,
    /// Terminal
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// An open WebSocket connection over a transport stream
pub struct Session<S> {
    stream: S,
    role: Role,
    state: ConnectionState,
    parser: FrameParser,
    assembler: MessageAssembler,
    read_buf: Vec<u8>,
}

impl<S> fmt::Debug for Session<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("role", &self.role)
            .field("state", &self.state)
            .field("buffered", &self.parser.buffered_len())
            .finish()
    }
}

impl<S: TransportStream> Session<S> {
    /// Start a session on a stream whose upgrade handshake has completed
    pub fn new(stream: S, role: Role) -> Self {
        Self {
            stream,
            role,
            state: ConnectionState::Open,
            parser: FrameParser::new(),
            assembler: MessageAssembler::new(),
            read_buf: vec![0u8; READ_BUFFER_SIZE],
        }
    }

    /// Limit the size of incoming messages. `None` means no limit.
    pub fn with_max_message_size(mut self, max: Option<usize>) -> Self {
        self.parser = std::mem::take(&mut self.parser).with_max_payload(max);
        self.assembler = std::mem::take(&mut self.assembler).with_max_size(max);
        self
    }

    /// Feed bytes that arrived behind the handshake before framing began
    pub fn with_buffered(mut self, bytes: &[u8]) -> Self {
        self.parser.extend(bytes);
        self
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Which end of the connection this session speaks for
    pub fn role(&self) -> Role {
        self.role
    }

    /// Whether messages can still be sent
    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// Borrow the underlying stream
    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Receive the next message.
    ///
    /// Returns `Ok(None)` once the connection is closed, either because the
    /// closing handshake finished earlier or because the stream ended.
    /// Pings are answered before they are returned.
    pub async fn next(&mut self) -> Result<Option<Message>> {
        loop {
            if self.state == ConnectionState::Closed {
                return Ok(None);
            }

            match self.parser.next_frame() {
                Ok(Some(frame)) => match self.handle_frame(frame).await {
                    Ok(Some(message)) => return Ok(Some(message)),
                    Ok(None) => continue,
                    Err(e) => return Err(self.fail(e).await),
                },
                Ok(None) => {}
                Err(e) => return Err(self.fail(e).await),
            }

            let n = match self.stream.read(&mut self.read_buf).await {
                Ok(n) => n,
                Err(e) => {
                    self.state = ConnectionState::Closed;
                    return Err(e);
                }
            };
            if n == 0 {
                self.state = ConnectionState::Closed;
                return Ok(None);
            }
            self.parser.extend(&self.read_buf[..n]);
        }
    }

    /// Send a message.
    ///
    /// Sending `Message::Close` starts the closing handshake; use
    /// [`Session::close`] to also wait for the peer's answer. Pings and
    /// pongs over 125 bytes and close codes that may not appear on the wire
    /// are refused before anything is written.
    pub async fn send(&mut self, message: Message) -> Result<()> {
        if self.state != ConnectionState::Open {
            return Err(Error::ConnectionClosed);
        }

        match &message {
            Message::Ping(payload) | Message::Pong(payload)
                if payload.len() > MAX_CONTROL_PAYLOAD =>
            {
                return Err(FrameError::ControlFrameTooLarge(payload.len()).into());
            }
            Message::Close(Some(close)) if close.code.is_reserved() => {
                return Err(ProtocolError::InvalidCloseCode(close.code.code()).into());
            }
            _ => {}
        }

        if let Message::Close(_) = message {
            self.state = ConnectionState::Closing;
        }
        self.send_frame(message.into_frame()).await
    }

    /// Run the closing handshake: send a close frame, then discard incoming
    /// messages until the peer's close frame or the end of the stream.
    pub async fn close(&mut self, code: CloseCode, reason: &str) -> Result<()> {
        if self.state == ConnectionState::Open {
            self.send(Message::close(code, reason)).await?;
        }

        while self.state == ConnectionState::Closing {
            if self.next().await?.is_none() {
                break;
            }
        }

        self.shutdown().await
    }

    /// Shut down the write half of the stream without a closing handshake
    pub async fn shutdown(&mut self) -> Result<()> {
        self.state = ConnectionState::Closed;
        match self.stream.close().await {
            Ok(()) => Ok(()),
            Err(e) if e.is_connection_reset() => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn handle_frame(&mut self, frame: Frame) -> Result<Option<Message>> {
        match (self.role.expects_masked(), frame.mask.is_some()) {
            (true, false) => return Err(ProtocolError::MaskingRequired.into()),
            (false, true) => return Err(ProtocolError::MaskingForbidden.into()),
            _ => {}
        }

        if !frame.is_control() {
            return self.assembler.feed_frame(frame);
        }

        let message = Message::from_control_frame(frame)?;
        match &message {
            Message::Ping(payload) if self.state == ConnectionState::Open => {
                self.send_frame(Frame::pong(payload.clone())).await?;
            }
            Message::Close(close) => self.on_peer_close(close.as_ref()).await?,
            _ => {}
        }
        Ok(Some(message))
    }

    async fn on_peer_close(&mut self, close: Option<&CloseFrame>) -> Result<()> {
        if self.state == ConnectionState::Open {
            let reply = Frame::close(close.map(|c| c.code.code()), "");
            self.state = ConnectionState::Closed;
            if let Err(e) = self.send_frame(reply).await {
                if !e.is_connection_reset() {
                    return Err(e);
                }
            }
        }
        self.state = ConnectionState::Closed;
        Ok(())
    }

    /// Fail the connection: tell the peer why if we still can, then stop
    async fn fail(&mut self, error: Error) -> Error {
        if self.state == ConnectionState::Open {
            if let Some(code) = error.close_code() {
                let _ = self
                    .send_frame(Frame::close(Some(code.code()), &error.to_string()))
                    .await;
            }
        }
        self.state = ConnectionState::Closed;
        self.assembler.reset();
        error
    }

    async fn send_frame(&mut self, frame: Frame) -> Result<()> {
        let frame = if self.role.masks_outgoing() {
            frame.with_random_mask()
        } else {
            frame
        };

        let result = async {
            self.stream.write_all(&frame.to_bytes()).await?;
            self.stream.flush().await
        }
        .await;

        if result.is_err() {
            self.state = ConnectionState::Closed;
        }
        result
    }
}
