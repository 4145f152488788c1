//! # echosock core
//!
//! RFC 6455 WebSocket protocol implementation shared by the echosock server,
//! client and self-test. It includes:
//!
//! - Error handling and types
//! - WebSocket frame parsing and generation
//! - Message handling and assembly
//! - The HTTP upgrade handshake for both ends
//! - Transport layer abstractions
//! - The per-connection [`Session`] state machine

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

// Core modules
pub mod error;
pub mod frame;
pub mod handshake;
pub mod message;
pub mod protocol;
pub mod session;
pub mod transport;

// Prelude module with common imports
pub mod prelude;

// Re-export key types for convenience
pub use error::{CloseCode, Error, Result};
pub use frame::{Frame, FrameParser};
pub use handshake::{HandshakeConfig, HandshakeRequest, HandshakeResponse};
pub use message::{CloseFrame, Message, MessageKind};
pub use protocol::{Opcode, Role};
pub use session::{ConnectionState, Session};
pub use transport::{IoStream, Transport, TransportStream};
