//! TCP transport implementation for echosock

use async_trait::async_trait;
use echosock_core::{
    transport::{Transport, TransportStream},
    Error, Result,
};
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream as TokioTcpStream};

/// Listening TCP socket
#[derive(Debug)]
pub struct TcpTransport {
    listener: TcpListener,
    local_addr: SocketAddr,
    nodelay: bool,
}

impl TcpTransport {
    /// Bind a listener to the given address. Port 0 picks a free port.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;

        Ok(Self {
            listener,
            local_addr,
            nodelay: true,
        })
    }

    /// Set `TCP_NODELAY` on accepted streams
    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }
}

#[async_trait]
impl Transport for TcpTransport {
    type Stream = TcpStream;

    async fn accept(&self) -> Result<Self::Stream> {
        let (stream, remote_addr) = self.listener.accept().await?;
        stream.set_nodelay(self.nodelay)?;
        TcpStream::with_peer(stream, remote_addr)
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.local_addr)
    }
}

/// Connected TCP stream
#[derive(Debug)]
pub struct TcpStream {
    stream: TokioTcpStream,
    remote_addr: SocketAddr,
    local_addr: SocketAddr,
}

impl TcpStream {
    /// Wrap a connected tokio TCP stream
    pub fn from_tokio(stream: TokioTcpStream) -> Result<Self> {
        let remote_addr = stream.peer_addr()?;
        Self::with_peer(stream, remote_addr)
    }

    fn with_peer(stream: TokioTcpStream, remote_addr: SocketAddr) -> Result<Self> {
        let local_addr = stream.local_addr()?;
        Ok(Self {
            stream,
            remote_addr,
            local_addr,
        })
    }

    /// Connect to a remote address
    pub async fn connect(addr: SocketAddr, nodelay: bool) -> Result<Self> {
        let stream = TokioTcpStream::connect(addr).await?;
        stream.set_nodelay(nodelay)?;
        Self::from_tokio(stream)
    }
}

#[async_trait]
impl TransportStream for TcpStream {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.stream.read(buf).await.map_err(Error::Io)
    }

    async fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        self.stream.write_all(buf).await.map_err(Error::Io)
    }

    async fn flush(&mut self) -> Result<()> {
        self.stream.flush().await.map_err(Error::Io)
    }

    async fn close(&mut self) -> Result<()> {
        self.stream.shutdown().await.map_err(Error::Io)
    }

    fn remote_addr(&self) -> Result<SocketAddr> {
        Ok(self.remote_addr)
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.local_addr)
    }
}
