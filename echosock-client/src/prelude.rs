//! Common imports for client code

pub use crate::client::Client;
pub use crate::config::ClientConfig;
pub use crate::connection::ClientConnection;
pub use crate::event::StreamEvent;
pub use echosock_core::{CloseCode, Message};
