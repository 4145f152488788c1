//! echosock server
//!
//! Accepts WebSocket connections on a TCP port and runs a [`Handler`] for
//! each of them. [`EchoHandler`] sends every text and binary message back
//! unchanged.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use echosock_server::prelude::*;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::builder().bind("127.0.0.1:8765")?.build()?;
//!     let bound = server.bind().await?;
//!     println!("echoing on {}", bound.local_addr());
//!     bound.serve().await?;
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

// Public modules
pub mod config;
pub mod connection;
pub mod error;
pub mod handler;
pub mod logging;
pub mod server;

// Prelude module with common imports
pub mod prelude;

// Re-export key types for convenience
pub use config::ServerConfig;
pub use connection::{Connection, ConnectionMetadata};
pub use error::{HandshakeError, ServerError};
pub use handler::{BoxedHandler, EchoHandler, Handler};
pub use server::{BoundServer, Server, ServerBuilder};
