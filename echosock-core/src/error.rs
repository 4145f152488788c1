//! Error types for echosock
//!
//! Every fallible operation in the protocol layer returns [`Result`]. The
//! sub-enums keep enough detail to pick the close code sent to the peer
//! when a connection has to be failed.

#![allow(missing_docs)]

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for echosock operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for echosock operations
#[derive(Error, Debug)]
pub enum Error {
    /// Protocol errors
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Frame errors
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    /// Timeout errors
    #[error("Timeout error: {0}")]
    Timeout(#[from] TimeoutError),

    /// Text message payload was not valid UTF-8
    #[error("Invalid UTF-8 in text message")]
    InvalidUtf8,

    /// Operation attempted on a connection that is no longer open, or the
    /// stream ended without a close frame
    #[error("Connection closed")]
    ConnectionClosed,

    /// The peer closed the connection with an error code
    #[error("Connection closed by peer: {0}")]
    PeerClosed(crate::message::CloseFrame),

    /// Generic errors
    #[error("Error: {0}")]
    Other(String),
}

impl Error {
    /// Close code to send to the peer when this error fails a connection.
    ///
    /// Returns `None` for errors where the transport itself is gone and no
    /// close frame can be delivered.
    pub fn close_code(&self) -> Option<CloseCode> {
        match self {
            Error::Protocol(ProtocolError::MessageTooLarge { .. }) => Some(CloseCode::TooBig),
            Error::Protocol(_) | Error::Frame(_) => Some(CloseCode::ProtocolError),
            Error::InvalidUtf8 => Some(CloseCode::InvalidPayload),
            Error::Config(_) | Error::Other(_) => Some(CloseCode::Internal),
            Error::Timeout(_) => Some(CloseCode::Away),
            Error::Io(_) | Error::ConnectionClosed | Error::PeerClosed(_) => None,
        }
    }

    /// Whether this error means the peer went away without a close frame
    pub fn is_connection_reset(&self) -> bool {
        match self {
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}

/// WebSocket protocol specific errors
#[derive(Error, Debug, Clone)]
pub enum ProtocolError {
    /// Request was not a WebSocket upgrade
    #[error("Invalid WebSocket upgrade request")]
    InvalidUpgradeRequest,

    /// Unsupported WebSocket version
    #[error("Unsupported WebSocket version: {0}")]
    UnsupportedVersion(String),

    /// Missing required headers
    #[error("Missing required header: {0}")]
    MissingHeader(String),

    /// Invalid header value
    #[error("Invalid header value for {header}: {value}")]
    InvalidHeaderValue { header: String, value: String },

    /// Invalid HTTP method
    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    /// Malformed HTTP message during the handshake
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Handshake header block exceeded the allowed size
    #[error("Handshake header block too large: {size} bytes (max: {max})")]
    HeaderTooLarge { size: usize, max: usize },

    /// Unexpected HTTP status in the server response
    #[error("Unexpected HTTP status: {0}")]
    UnexpectedStatus(u16),

    /// Invalid accept key
    #[error("Invalid WebSocket accept key - expected: {expected}, received: {received}")]
    InvalidAcceptKey { expected: String, received: String },

    /// Unsupported URL scheme
    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Continuation frame without a message in progress, or a new data
    /// frame while one is in progress
    #[error("Invalid continuation frame")]
    InvalidContinuation,

    /// Client sent an unmasked frame
    #[error("Client frames must be masked")]
    MaskingRequired,

    /// Server sent a masked frame
    #[error("Server frames must not be masked")]
    MaskingForbidden,

    /// Invalid close code received
    #[error("Invalid close code: {0}")]
    InvalidCloseCode(u16),

    /// Close frame payload of length one
    #[error("Close frame payload too short")]
    InvalidClosePayload,

    /// Message exceeded the configured limit
    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },
}

/// Frame parsing and processing errors
#[derive(Error, Debug, Clone)]
pub enum FrameError {
    /// Insufficient data to parse frame
    #[error("Insufficient data: need {needed} bytes, have {have}")]
    InsufficientData { needed: usize, have: usize },

    /// Invalid opcode
    #[error("Invalid opcode: {0}")]
    InvalidOpcode(u8),

    /// Reserved bits set without a negotiated extension
    #[error("Reserved bits set in frame")]
    ReservedBitsSet,

    /// Control frames cannot be fragmented
    #[error("Control frames cannot be fragmented")]
    FragmentedControlFrame,

    /// Control frame payload longer than 125 bytes
    #[error("Control frame too large: {0} bytes")]
    ControlFrameTooLarge(usize),

    /// 64-bit length with the most significant bit set
    #[error("Invalid payload length: {0}")]
    InvalidLength(u64),
}

/// Configuration errors
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    Validation(String),
}

/// Timeout errors
#[derive(Error, Debug, Clone)]
pub enum TimeoutError {
    /// Connect plus upgrade handshake did not finish in time
    #[error("Handshake timeout: {timeout:?}")]
    Handshake { timeout: Duration },
}

/// WebSocket close codes as defined in RFC 6455
///
/// `NoStatus`, `Abnormal` and `TlsHandshake` only describe how a connection
/// ended. They are never valid in a close frame, and sending one fails with
/// [`ProtocolError::InvalidCloseCode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseCode {
    /// Normal closure
    Normal,
    /// Going away
    Away,
    /// Protocol error
    ProtocolError,
    /// Unsupported data
    Unsupported,
    /// No status received
    NoStatus,
    /// Abnormal closure
    Abnormal,
    /// Invalid frame payload data
    InvalidPayload,
    /// Policy violation
    PolicyViolation,
    /// Message too big
    TooBig,
    /// Mandatory extension
    MandatoryExtension,
    /// Internal server error
    Internal,
    /// TLS handshake failure
    TlsHandshake,
    /// Application-specific close code (3000..=4999)
    Application(u16),
}

impl CloseCode {
    /// Decode a close code received on the wire.
    ///
    /// Codes that must never appear in a close frame (1005, 1006, 1015,
    /// anything below 1000 and the unassigned ranges) are rejected.
    pub fn from_wire(code: u16) -> std::result::Result<Self, ProtocolError> {
        let decoded = match code {
            1000 => CloseCode::Normal,
            1001 => CloseCode::Away,
            1002 => CloseCode::ProtocolError,
            1003 => CloseCode::Unsupported,
            1007 => CloseCode::InvalidPayload,
            1008 => CloseCode::PolicyViolation,
            1009 => CloseCode::TooBig,
            1010 => CloseCode::MandatoryExtension,
            1011 => CloseCode::Internal,
            3000..=4999 => CloseCode::Application(code),
            _ => return Err(ProtocolError::InvalidCloseCode(code)),
        };
        Ok(decoded)
    }

    /// Get the numeric value of the close code
    pub fn code(&self) -> u16 {
        match self {
            CloseCode::Normal => 1000,
            CloseCode::Away => 1001,
            CloseCode::ProtocolError => 1002,
            CloseCode::Unsupported => 1003,
            CloseCode::NoStatus => 1005,
            CloseCode::Abnormal => 1006,
            CloseCode::InvalidPayload => 1007,
            CloseCode::PolicyViolation => 1008,
            CloseCode::TooBig => 1009,
            CloseCode::MandatoryExtension => 1010,
            CloseCode::Internal => 1011,
            CloseCode::TlsHandshake => 1015,
            CloseCode::Application(code) => *code,
        }
    }

    /// Check if this is a reserved close code that must not be sent
    pub fn is_reserved(&self) -> bool {
        matches!(
            self,
            CloseCode::NoStatus | CloseCode::Abnormal | CloseCode::TlsHandshake
        )
    }

    /// Check if this close code indicates an error
    pub fn is_error(&self) -> bool {
        !matches!(self, CloseCode::Normal | CloseCode::Away)
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CloseCode::Normal => "normal",
            CloseCode::Away => "going away",
            CloseCode::ProtocolError => "protocol error",
            CloseCode::Unsupported => "unsupported data",
            CloseCode::NoStatus => "no status",
            CloseCode::Abnormal => "abnormal closure",
            CloseCode::InvalidPayload => "invalid payload",
            CloseCode::PolicyViolation => "policy violation",
            CloseCode::TooBig => "message too big",
            CloseCode::MandatoryExtension => "mandatory extension",
            CloseCode::Internal => "internal error",
            CloseCode::TlsHandshake => "TLS handshake failure",
            CloseCode::Application(_) => "application",
        };
        write!(f, "{} ({})", name, self.code())
    }
}
