//! Prelude module for the echosock server

pub use crate::config::ServerConfig;
pub use crate::connection::Connection;
pub use crate::error::ServerError;
pub use crate::handler::{EchoHandler, Handler};
pub use crate::server::{BoundServer, Server, ServerBuilder};
pub use echosock_core::{CloseCode, Message};
