//! Command line arguments

use clap::Parser;

/// WebSocket echo server that checks itself on startup
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "echosock")]
#[command(version)]
#[command(about = "WebSocket echo server with a startup self-test", long_about = None)]
pub struct Cli {
    /// TCP port to listen on (bound on 127.0.0.1)
    pub port: u16,
}
