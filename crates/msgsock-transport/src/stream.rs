use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;

/// A connected byte stream — implements `AsyncRead` + `AsyncWrite`.
///
/// This is the fundamental I/O type returned by transport operations.
/// It wraps either a plain TCP stream or a TLS session over TCP,
/// depending on how the connection was established.
pub struct NetStream {
    inner: NetStreamInner,
}

enum NetStreamInner {
    Tcp(TcpStream),
    TlsClient(Box<tokio_rustls::client::TlsStream<TcpStream>>),
    TlsServer(Box<tokio_rustls::server::TlsStream<TcpStream>>),
}

impl NetStream {
    pub(crate) fn from_tcp(stream: TcpStream) -> Self {
        Self {
            inner: NetStreamInner::Tcp(stream),
        }
    }

    pub(crate) fn from_tls_client(stream: tokio_rustls::client::TlsStream<TcpStream>) -> Self {
        Self {
            inner: NetStreamInner::TlsClient(Box::new(stream)),
        }
    }

    pub(crate) fn from_tls_server(stream: tokio_rustls::server::TlsStream<TcpStream>) -> Self {
        Self {
            inner: NetStreamInner::TlsServer(Box::new(stream)),
        }
    }

    /// Whether this stream is protected by TLS.
    pub fn is_secure(&self) -> bool {
        !matches!(self.inner, NetStreamInner::Tcp(_))
    }

    /// Address of the remote peer.
    pub fn peer_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        match &self.inner {
            NetStreamInner::Tcp(stream) => stream.peer_addr(),
            NetStreamInner::TlsClient(stream) => stream.get_ref().0.peer_addr(),
            NetStreamInner::TlsServer(stream) => stream.get_ref().0.peer_addr(),
        }
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match &self.inner {
            NetStreamInner::Tcp(_) => "tcp",
            NetStreamInner::TlsClient(_) | NetStreamInner::TlsServer(_) => "tls",
        }
    }
}

impl AsyncRead for NetStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match &mut self.get_mut().inner {
            NetStreamInner::Tcp(stream) => Pin::new(stream).poll_read(cx, buf),
            NetStreamInner::TlsClient(stream) => Pin::new(stream.as_mut()).poll_read(cx, buf),
            NetStreamInner::TlsServer(stream) => Pin::new(stream.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for NetStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match &mut self.get_mut().inner {
            NetStreamInner::Tcp(stream) => Pin::new(stream).poll_write(cx, buf),
            NetStreamInner::TlsClient(stream) => Pin::new(stream.as_mut()).poll_write(cx, buf),
            NetStreamInner::TlsServer(stream) => Pin::new(stream.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match &mut self.get_mut().inner {
            NetStreamInner::Tcp(stream) => Pin::new(stream).poll_flush(cx),
            NetStreamInner::TlsClient(stream) => Pin::new(stream.as_mut()).poll_flush(cx),
            NetStreamInner::TlsServer(stream) => Pin::new(stream.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match &mut self.get_mut().inner {
            NetStreamInner::Tcp(stream) => Pin::new(stream).poll_shutdown(cx),
            NetStreamInner::TlsClient(stream) => Pin::new(stream.as_mut()).poll_shutdown(cx),
            NetStreamInner::TlsServer(stream) => Pin::new(stream.as_mut()).poll_shutdown(cx),
        }
    }
}

impl std::fmt::Debug for NetStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetStream")
            .field("type", &self.transport_name())
            .finish()
    }
}
