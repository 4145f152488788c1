//! WebSocket frame parsing and serialization
//!
//! Frames are decoded from a growing [`BytesMut`] buffer and only consumed
//! once they are complete. Payloads are kept unmasked in memory; the masking
//! key, if any, is applied when the frame is written.

use crate::{
    error::{FrameError, Result},
    protocol::{
        constants::{MAX_CLOSE_REASON_SIZE, MAX_CONTROL_PAYLOAD},
        frame::*,
        Opcode,
    },
};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Represents a WebSocket frame according to RFC 6455
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Indicates if this is the final frame in a message
    pub fin: bool,
    /// Reserved bits (RSV1, RSV2, RSV3)
    pub rsv: [bool; 3],
    /// Frame opcode
    pub opcode: Opcode,
    /// Masking key, present on every frame a client sends
    pub mask: Option<[u8; 4]>,
    /// Unmasked payload data
    pub payload: Bytes,
}

impl Frame {
    /// Create a new final, unmasked frame with the given opcode and payload
    pub fn new(opcode: Opcode, payload: impl Into<Bytes>) -> Self {
        Self {
            fin: true,
            rsv: [false; 3],
            opcode,
            mask: None,
            payload: payload.into(),
        }
    }

    /// Create a continuation frame
    pub fn continuation(payload: impl Into<Bytes>) -> Self {
        Self::new(Opcode::Continuation, payload)
    }

    /// Create a text frame
    pub fn text(payload: impl Into<Bytes>) -> Self {
        Self::new(Opcode::Text, payload)
    }

    /// Create a binary frame
    pub fn binary(payload: impl Into<Bytes>) -> Self {
        Self::new(Opcode::Binary, payload)
    }

    /// Create a close frame with an optional code and reason.
    ///
    /// The reason is dropped when no code is given and truncated to 123
    /// bytes on a character boundary otherwise.
    pub fn close(code: Option<u16>, reason: &str) -> Self {
        let mut payload = BytesMut::new();

        if let Some(code) = code {
            payload.put_u16(code);
            payload.put_slice(truncate_reason(reason).as_bytes());
        }

        Self::new(Opcode::Close, payload.freeze())
    }

    /// Create a ping frame
    pub fn ping(payload: impl Into<Bytes>) -> Self {
        Self::new(Opcode::Ping, payload)
    }

    /// Create a pong frame
    pub fn pong(payload: impl Into<Bytes>) -> Self {
        Self::new(Opcode::Pong, payload)
    }

    /// Set the FIN bit
    pub fn fin(mut self, fin: bool) -> Self {
        self.fin = fin;
        self
    }

    /// Mask the frame with the given key when it is written
    pub fn masked(mut self, key: [u8; 4]) -> Self {
        self.mask = Some(key);
        self
    }

    /// Mask the frame with a fresh random key
    pub fn with_random_mask(self) -> Self {
        self.masked(rand::random::<[u8; 4]>())
    }

    /// Serialize the frame to bytes
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.payload.len() + 14);
        self.write_to(&mut buf);
        buf.freeze()
    }

    /// Write the frame to a buffer
    pub fn write_to(&self, buf: &mut BytesMut) {
        let first_byte = ((self.fin as u8) << 7)
            | ((self.rsv[0] as u8) << 6)
            | ((self.rsv[1] as u8) << 5)
            | ((self.rsv[2] as u8) << 4)
            | self.opcode.value();
        buf.put_u8(first_byte);

        let payload_len = self.payload.len();
        let mask_bit = if self.mask.is_some() { MASK_BIT } else { 0 };

        if payload_len < PAYLOAD_LEN_16 as usize {
            buf.put_u8(mask_bit | payload_len as u8);
        } else if payload_len <= u16::MAX as usize {
            buf.put_u8(mask_bit | PAYLOAD_LEN_16);
            buf.put_u16(payload_len as u16);
        } else {
            buf.put_u8(mask_bit | PAYLOAD_LEN_64);
            buf.put_u64(payload_len as u64);
        }

        match self.mask {
            Some(key) => {
                buf.put_slice(&key);
                let start = buf.len();
                buf.put_slice(&self.payload);
                apply_mask(&mut buf[start..], key);
            }
            None => buf.put_slice(&self.payload),
        }
    }

    /// Parse one complete frame from the front of `buf`.
    ///
    /// On [`FrameError::InsufficientData`] nothing is consumed and the caller
    /// should read more bytes and try again.
    pub fn parse(buf: &mut BytesMut) -> Result<Self> {
        let header = decode_header(buf)?;
        let total = header.header_len + header.payload_len;
        if buf.len() < total {
            return Err(FrameError::InsufficientData {
                needed: total,
                have: buf.len(),
            }
            .into());
        }

        buf.advance(header.header_len);
        let mut payload = buf.split_to(header.payload_len);
        if let Some(key) = header.mask {
            apply_mask(&mut payload, key);
        }

        Ok(Frame {
            fin: header.fin,
            rsv: header.rsv,
            opcode: header.opcode,
            mask: header.mask,
            payload: payload.freeze(),
        })
    }

    /// Get the payload length
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Check if this is a control frame
    pub fn is_control(&self) -> bool {
        self.opcode.is_control()
    }

    /// Check if this is a data frame
    pub fn is_data(&self) -> bool {
        self.opcode.is_data()
    }

    /// Check if this is the final frame
    pub fn is_final(&self) -> bool {
        self.fin
    }
}

/// Decoded fixed part of a frame
#[derive(Debug, Clone, Copy)]
struct FrameHeader {
    fin: bool,
    rsv: [bool; 3],
    opcode: Opcode,
    mask: Option<[u8; 4]>,
    header_len: usize,
    payload_len: usize,
}

/// Decode and validate the header at the front of `buf` without consuming it
fn decode_header(buf: &[u8]) -> Result<FrameHeader> {
    if buf.len() < 2 {
        return Err(FrameError::InsufficientData {
            needed: 2,
            have: buf.len(),
        }
        .into());
    }

    let first_byte = buf[0];
    let fin = first_byte & FIN_BIT != 0;
    let rsv = [
        first_byte & RSV1_BIT != 0,
        first_byte & RSV2_BIT != 0,
        first_byte & RSV3_BIT != 0,
    ];
    if rsv.iter().any(|bit| *bit) {
        return Err(FrameError::ReservedBitsSet.into());
    }

    let raw_opcode = first_byte & OPCODE_MASK;
    let opcode = Opcode::from_u8(raw_opcode).ok_or(FrameError::InvalidOpcode(raw_opcode))?;

    let second_byte = buf[1];
    let masked = second_byte & MASK_BIT != 0;
    let mut cursor = &buf[2..];
    let mut header_len = 2;

    let payload_len = match second_byte & PAYLOAD_LEN_MASK {
        PAYLOAD_LEN_16 => {
            if cursor.len() < 2 {
                return Err(FrameError::InsufficientData {
                    needed: 4,
                    have: buf.len(),
                }
                .into());
            }
            header_len += 2;
            cursor.get_u16() as u64
        }
        PAYLOAD_LEN_64 => {
            if cursor.len() < 8 {
                return Err(FrameError::InsufficientData {
                    needed: 10,
                    have: buf.len(),
                }
                .into());
            }
            header_len += 8;
            let len = cursor.get_u64();
            if len >> 63 != 0 {
                return Err(FrameError::InvalidLength(len).into());
            }
            len
        }
        len => len as u64,
    };
    let payload_len =
        usize::try_from(payload_len).map_err(|_| FrameError::InvalidLength(payload_len))?;

    if opcode.is_control() {
        if !fin {
            return Err(FrameError::FragmentedControlFrame.into());
        }
        if payload_len > MAX_CONTROL_PAYLOAD {
            return Err(FrameError::ControlFrameTooLarge(payload_len).into());
        }
    }

    let mask = if masked {
        if cursor.len() < MASKING_KEY_LEN {
            return Err(FrameError::InsufficientData {
                needed: header_len + MASKING_KEY_LEN,
                have: buf.len(),
            }
            .into());
        }
        let mut key = [0u8; 4];
        cursor.copy_to_slice(&mut key);
        header_len += MASKING_KEY_LEN;
        Some(key)
    } else {
        None
    };

    Ok(FrameHeader {
        fin,
        rsv,
        opcode,
        mask,
        header_len,
        payload_len,
    })
}

/// XOR `data` in place with the 4-byte masking key
pub fn apply_mask(data: &mut [u8], key: [u8; 4]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= key[i % 4];
    }
}

fn truncate_reason(reason: &str) -> &str {
    if reason.len() <= MAX_CLOSE_REASON_SIZE {
        return reason;
    }
    let mut end = MAX_CLOSE_REASON_SIZE;
    while !reason.is_char_boundary(end) {
        end -= 1;
    }
    &reason[..end]
}

/// Incremental frame parser fed from a byte stream
#[derive(Debug, Default)]
pub struct FrameParser {
    buffer: BytesMut,
    max_payload: Option<usize>,
}

impl FrameParser {
    /// Create a new frame parser
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject frames whose declared payload exceeds `max` as soon as the
    /// header is visible, before the payload is buffered
    pub fn with_max_payload(mut self, max: Option<usize>) -> Self {
        self.max_payload = max;
        self
    }

    /// Append bytes read from the transport
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Take the next complete frame, or `None` when more bytes are needed
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        let header = match decode_header(&self.buffer) {
            Ok(header) => header,
            Err(crate::Error::Frame(FrameError::InsufficientData { .. })) => return Ok(None),
            Err(e) => return Err(e),
        };

        if let Some(max) = self.max_payload {
            if header.payload_len > max {
                return Err(crate::error::ProtocolError::MessageTooLarge {
                    size: header.payload_len,
                    max,
                }
                .into());
            }
        }

        if self.buffer.len() < header.header_len + header.payload_len {
            return Ok(None);
        }

        Frame::parse(&mut self.buffer).map(Some)
    }

    /// Number of bytes buffered but not yet parsed
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }
}
