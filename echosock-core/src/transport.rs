//! Transport layer abstraction
//!
//! The protocol code only needs a byte stream that can be read, written and
//! shut down. [`Transport`] produces such streams on the accepting side;
//! [`IoStream`] adapts any tokio I/O object, which is how in-memory streams
//! are driven in tests.

use crate::error::{Error, Result};
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Transport trait for abstracting different transport types
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    /// The stream type produced by this transport
    type Stream: TransportStream + 'static;

    /// Accept an incoming connection
    async fn accept(&self) -> Result<Self::Stream>;

    /// Get the local address
    fn local_addr(&self) -> Result<SocketAddr>;
}

/// Trait for transport streams
#[async_trait::async_trait]
pub trait TransportStream: Send {
    /// Read data from the stream. `Ok(0)` means end of stream.
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write all data to the stream
    async fn write_all(&mut self, buf: &[u8]) -> Result<()>;

    /// Flush the stream
    async fn flush(&mut self) -> Result<()>;

    /// Shut down the write half of the stream
    async fn close(&mut self) -> Result<()>;

    /// Get the remote address
    fn remote_addr(&self) -> Result<SocketAddr>;

    /// Get the local address
    fn local_addr(&self) -> Result<SocketAddr>;
}

#[async_trait::async_trait]
impl<T> TransportStream for Box<T>
where
    T: TransportStream + ?Sized,
{
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf).await
    }

    async fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        (**self).write_all(buf).await
    }

    async fn flush(&mut self) -> Result<()> {
        (**self).flush().await
    }

    async fn close(&mut self) -> Result<()> {
        (**self).close().await
    }

    fn remote_addr(&self) -> Result<SocketAddr> {
        (**self).remote_addr()
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        (**self).local_addr()
    }
}

/// [`TransportStream`] over any tokio I/O object
#[derive(Debug)]
pub struct IoStream<S> {
    inner: S,
    remote_addr: Option<SocketAddr>,
    local_addr: Option<SocketAddr>,
}

impl<S> IoStream<S> {
    /// Wrap an I/O object that has no socket addresses
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            remote_addr: None,
            local_addr: None,
        }
    }

    /// Attach the addresses reported by `remote_addr` and `local_addr`
    pub fn with_addrs(mut self, remote: SocketAddr, local: SocketAddr) -> Self {
        self.remote_addr = Some(remote);
        self.local_addr = Some(local);
        self
    }

    /// Get the wrapped I/O object back
    pub fn into_inner(self) -> S {
        self.inner
    }
}

#[async_trait::async_trait]
impl<S> TransportStream for IoStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.inner.read(buf).await?)
    }

    async fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        Ok(self.inner.write_all(buf).await?)
    }

    async fn flush(&mut self) -> Result<()> {
        Ok(self.inner.flush().await?)
    }

    async fn close(&mut self) -> Result<()> {
        Ok(self.inner.shutdown().await?)
    }

    fn remote_addr(&self) -> Result<SocketAddr> {
        self.remote_addr
            .ok_or_else(|| Error::Other("stream has no remote address".to_string()))
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        self.local_addr
            .ok_or_else(|| Error::Other("stream has no local address".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_io_stream_over_duplex() {
        let (a, b) = tokio::io::duplex(64);
        let mut left = IoStream::new(a);
        let mut right = IoStream::new(b);

        left.write_all(b"abc").await.unwrap();
        left.flush().await.unwrap();
        let mut buf = [0u8; 8];
        let n = right.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"abc");

        left.close().await.unwrap();
        assert_eq!(right.read(&mut buf).await.unwrap(), 0);
    }

    #[test]
    fn test_io_stream_addrs() {
        let (a, _b) = tokio::io::duplex(8);
        let stream = IoStream::new(a);
        assert!(stream.remote_addr().is_err());

        let remote: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        let local: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        let stream = stream.with_addrs(remote, local);
        assert_eq!(stream.remote_addr().unwrap(), remote);
        assert_eq!(stream.local_addr().unwrap(), local);
    }
}
