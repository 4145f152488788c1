//! echosock client
//!
//! A small `ws://` client built on the same session code as the server.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use echosock_client::prelude::*;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut conn = Client::new("ws://127.0.0.1:8765/")?.connect().await?;
//!     conn.send_text("hello").await?;
//!     if let Some(reply) = conn.next().await? {
//!         println!("{}", reply);
//!     }
//!     conn.close(CloseCode::Normal, "").await?;
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

pub mod client;
pub mod config;
pub mod connection;
pub mod event;

pub mod prelude;

pub use client::{Client, WsUrl};
pub use config::ClientConfig;
pub use connection::{ClientConnection, ClientMetadata, MessageSink};
pub use event::StreamEvent;
