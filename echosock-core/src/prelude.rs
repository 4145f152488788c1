//! Prelude module for echosock core
//!
//! Re-exports the types most code that talks WebSocket needs.

pub use crate::error::{CloseCode, Error, Result};
pub use crate::message::{CloseFrame, Message, MessageKind};
pub use crate::protocol::Role;
pub use crate::session::{ConnectionState, Session};
pub use crate::transport::{Transport, TransportStream};

pub use bytes::{Bytes, BytesMut};
