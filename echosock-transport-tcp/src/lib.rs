//! TCP Transport for echosock
//!
//! tokio TCP listener and stream behind the core transport traits.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

pub mod tcp;

// Re-export TCP transport types
pub use tcp::{TcpStream, TcpTransport};

/// Prelude module
pub mod prelude {
    pub use crate::tcp::{TcpStream, TcpTransport};
    pub use echosock_core::transport::{Transport, TransportStream};
}
