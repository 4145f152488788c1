//! # echosock
//!
//! A WebSocket echo server that checks itself as soon as it is listening.
//!
//! The `echosock` binary takes one argument, the TCP port. It binds
//! `127.0.0.1:<port>`, starts a [`selftest::SelfTest`] that sends `"hello"`
//! and expects it back within three seconds, logs the result and keeps
//! serving.
//!
//! The building blocks are re-exported for embedding:
//!
//! ```rust,no_run
//! use echosock::selftest::SelfTest;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let server = echosock::app::bind(0).await?;
//!     let port = server.local_addr().port();
//!     tokio::spawn(server.serve());
//!
//!     let report = SelfTest::new(port).run().await?;
//!     println!("{report}");
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

pub mod app;
pub mod cli;
pub mod selftest;

pub use echosock_client as client;
pub use echosock_server as server;
pub use echosock_core::{CloseCode, Error, Message};

/// Prelude module with common imports
pub mod prelude {
    pub use crate::selftest::{SelfTest, SelfTestError, SelfTestReport};
    pub use echosock_client::prelude::*;
    pub use echosock_server::prelude::{BoundServer, EchoHandler, Handler, Server};
}
