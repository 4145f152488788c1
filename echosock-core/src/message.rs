//! Message handling for echosock
//!
//! High-level WebSocket messages and the assembler that turns a sequence of
//! data frames back into whole messages.

use crate::error::{CloseCode, Error, ProtocolError, Result};
use crate::frame::Frame;
use crate::protocol::Opcode;
use bytes::{Bytes, BytesMut};
use std::fmt;

/// Represents a complete WebSocket message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Text message, always valid UTF-8
    Text(String),
    /// Binary message
    Binary(Bytes),
    /// Ping message
    Ping(Bytes),
    /// Pong message
    Pong(Bytes),
    /// Close message, with the peer's code and reason when it sent one
    Close(Option<CloseFrame>),
}

impl Message {
    /// Create a text message
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Create a binary message
    pub fn binary(data: impl Into<Bytes>) -> Self {
        Self::Binary(data.into())
    }

    /// Create a close message carrying a code and reason
    pub fn close(code: CloseCode, reason: impl Into<String>) -> Self {
        Self::Close(Some(CloseFrame::new(code, reason)))
    }

    /// Get the message kind
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Text(_) => MessageKind::Text,
            Message::Binary(_) => MessageKind::Binary,
            Message::Ping(_) => MessageKind::Ping,
            Message::Pong(_) => MessageKind::Pong,
            Message::Close(_) => MessageKind::Close,
        }
    }

    /// Check if this is a control message
    pub fn is_control(&self) -> bool {
        matches!(self, Message::Ping(_) | Message::Pong(_) | Message::Close(_))
    }

    /// Check if this is a data message
    pub fn is_data(&self) -> bool {
        matches!(self, Message::Text(_) | Message::Binary(_))
    }

    /// Get the message payload as text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Message::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Get the message payload as bytes. Close messages yield their reason.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Message::Text(text) => text.as_bytes(),
            Message::Binary(data) | Message::Ping(data) | Message::Pong(data) => data,
            Message::Close(Some(close)) => close.reason.as_bytes(),
            Message::Close(None) => &[],
        }
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convert the message into a single unmasked frame
    pub fn into_frame(self) -> Frame {
        match self {
            Message::Text(text) => Frame::text(text),
            Message::Binary(data) => Frame::binary(data),
            Message::Ping(data) => Frame::ping(data),
            Message::Pong(data) => Frame::pong(data),
            Message::Close(Some(close)) => Frame::close(Some(close.code.code()), &close.reason),
            Message::Close(None) => Frame::close(None, ""),
        }
    }

    /// Decode a control frame. Control frames are never fragmented so they
    /// map to exactly one message.
    pub fn from_control_frame(frame: Frame) -> Result<Self> {
        match frame.opcode {
            Opcode::Ping => Ok(Message::Ping(frame.payload)),
            Opcode::Pong => Ok(Message::Pong(frame.payload)),
            Opcode::Close => Ok(Message::Close(CloseFrame::parse(&frame.payload)?)),
            other => Err(Error::Other(format!("{other} is not a control opcode"))),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Text(text) => write!(f, "Text({text})"),
            Message::Binary(data) => write!(f, "Binary({} bytes)", data.len()),
            Message::Ping(data) => write!(f, "Ping({} bytes)", data.len()),
            Message::Pong(data) => write!(f, "Pong({} bytes)", data.len()),
            Message::Close(Some(close)) => write!(f, "Close({close})"),
            Message::Close(None) => f.write_str("Close"),
        }
    }
}

/// Message kind for easier matching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Text message
    Text,
    /// Binary message
    Binary,
    /// Ping message
    Ping,
    /// Pong message
    Pong,
    /// Close message
    Close,
}

/// Code and reason carried by a close frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFrame {
    /// Close code
    pub code: CloseCode,
    /// UTF-8 reason, possibly empty
    pub reason: String,
}

impl CloseFrame {
    /// Create a new close frame body
    pub fn new(code: CloseCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Decode a close frame payload.
    ///
    /// An empty payload means the peer sent no status. A one byte payload,
    /// a code that may not appear on the wire or a reason that is not UTF-8
    /// is a protocol violation.
    pub fn parse(payload: &[u8]) -> Result<Option<Self>> {
        match payload.len() {
            0 => Ok(None),
            1 => Err(ProtocolError::InvalidClosePayload.into()),
            _ => {
                let code = CloseCode::from_wire(u16::from_be_bytes([payload[0], payload[1]]))?;
                let reason = std::str::from_utf8(&payload[2..]).map_err(|_| Error::InvalidUtf8)?;
                Ok(Some(Self::new(code, reason)))
            }
        }
    }
}

impl fmt::Display for CloseFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reason.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{}: {}", self.code, self.reason)
        }
    }
}

/// Message assembler for fragmented messages
#[derive(Debug, Default)]
pub struct MessageAssembler {
    buffer: BytesMut,
    /// Opcode of the message being assembled, if any
    opcode: Option<Opcode>,
    max_size: Option<usize>,
}

impl MessageAssembler {
    /// Create a new message assembler
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit the size of an assembled message
    pub fn with_max_size(mut self, max_size: Option<usize>) -> Self {
        self.max_size = max_size;
        self
    }

    /// Whether a fragmented message is in progress
    pub fn is_assembling(&self) -> bool {
        self.opcode.is_some()
    }

    /// Feed a data frame and return the message it completes, if any.
    ///
    /// Control frames must be handled by the caller; they may arrive between
    /// the fragments of a data message.
    pub fn feed_frame(&mut self, frame: Frame) -> Result<Option<Message>> {
        match (frame.opcode, self.opcode) {
            (Opcode::Continuation, None) => {
                return Err(ProtocolError::InvalidContinuation.into())
            }
            (Opcode::Continuation, Some(_)) => {}
            (Opcode::Text | Opcode::Binary, None) => {
                if frame.fin {
                    self.check_size(frame.payload.len())?;
                    return build_message(frame.opcode, frame.payload).map(Some);
                }
                self.opcode = Some(frame.opcode);
            }
            (Opcode::Text | Opcode::Binary, Some(_)) => {
                return Err(ProtocolError::InvalidContinuation.into())
            }
            (opcode, _) => {
                return Err(Error::Other(format!("{opcode} is not a data opcode")));
            }
        }

        self.check_size(self.buffer.len() + frame.payload.len())?;
        self.buffer.extend_from_slice(&frame.payload);

        if !frame.fin {
            return Ok(None);
        }

        let opcode = self.opcode.take().unwrap_or(Opcode::Binary);
        let payload = self.buffer.split().freeze();
        build_message(opcode, payload).map(Some)
    }

    /// Drop any partially assembled message
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.opcode = None;
    }

    fn check_size(&self, size: usize) -> Result<()> {
        match self.max_size {
            Some(max) if size > max => Err(ProtocolError::MessageTooLarge { size, max }.into()),
            _ => Ok(()),
        }
    }
}

fn build_message(opcode: Opcode, payload: Bytes) -> Result<Message> {
    match opcode {
        Opcode::Text => String::from_utf8(payload.to_vec())
            .map(Message::Text)
            .map_err(|_| Error::InvalidUtf8),
        _ => Ok(Message::Binary(payload)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_frame_messages() {
        let mut assembler = MessageAssembler::new();
        let text = assembler.feed_frame(Frame::text("hello")).unwrap();
        assert_eq!(text, Some(Message::text("hello")));

        let binary = assembler.feed_frame(Frame::binary(vec![0u8, 255])).unwrap();
        assert_eq!(binary, Some(Message::binary(vec![0u8, 255])));
    }

    #[test]
    fn test_fragmented_text_reassembly() {
        let mut assembler = MessageAssembler::new();
        // "héllo" split inside the two-byte character
        let bytes = "héllo".as_bytes();
        assert!(assembler
            .feed_frame(Frame::text(bytes[..2].to_vec()).fin(false))
            .unwrap()
            .is_none());
        assert!(assembler.is_assembling());
        assert!(assembler
            .feed_frame(Frame::continuation(bytes[2..4].to_vec()).fin(false))
            .unwrap()
            .is_none());
        let message = assembler
            .feed_frame(Frame::continuation(bytes[4..].to_vec()))
            .unwrap();
        assert_eq!(message, Some(Message::text("héllo")));
        assert!(!assembler.is_assembling());
    }

    #[test]
    fn test_continuation_errors() {
        let mut assembler = MessageAssembler::new();
        assert!(matches!(
            assembler.feed_frame(Frame::continuation("x")),
            Err(Error::Protocol(ProtocolError::InvalidContinuation))
        ));

        assembler.feed_frame(Frame::binary("a").fin(false)).unwrap();
        assert!(matches!(
            assembler.feed_frame(Frame::text("b")),
            Err(Error::Protocol(ProtocolError::InvalidContinuation))
        ));
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let mut assembler = MessageAssembler::new();
        let result = assembler.feed_frame(Frame::text(vec![0xffu8, 0xfe]));
        assert!(matches!(result, Err(Error::InvalidUtf8)));
    }

    #[test]
    fn test_max_size_across_fragments() {
        let mut assembler = MessageAssembler::new().with_max_size(Some(4));
        assembler.feed_frame(Frame::binary("abc").fin(false)).unwrap();
        assert!(matches!(
            assembler.feed_frame(Frame::continuation("de")),
            Err(Error::Protocol(ProtocolError::MessageTooLarge { size: 5, max: 4 }))
        ));
    }

    #[test]
    fn test_close_frame_parse() {
        assert_eq!(CloseFrame::parse(&[]).unwrap(), None);
        assert!(CloseFrame::parse(&[0x03]).is_err());

        let close = CloseFrame::parse(b"\x03\xe8done").unwrap().unwrap();
        assert_eq!(close.code, CloseCode::Normal);
        assert_eq!(close.reason, "done");

        // 1005 may never be sent on the wire
        assert!(CloseFrame::parse(&[0x03, 0xed]).is_err());
    }

    #[test]
    fn test_control_frame_messages() {
        let ping = Message::from_control_frame(Frame::ping("p")).unwrap();
        assert_eq!(ping, Message::Ping(Bytes::from_static(b"p")));

        let close = Message::close(CloseCode::Away, "bye");
        let frame = close.clone().into_frame();
        assert_eq!(Message::from_control_frame(frame).unwrap(), close);
    }

    #[test]
    fn test_message_display() {
        assert_eq!(Message::text("hi").to_string(), "Text(hi)");
        assert_eq!(Message::binary(vec![1u8, 2]).to_string(), "Binary(2 bytes)");
        assert_eq!(
            Message::close(CloseCode::Normal, "").to_string(),
            "Close(normal (1000))"
        );
    }
}
