use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::{TlsAcceptor, TlsConnector};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::NetStream;

/// Client-side TLS settings: the rustls configuration plus the server name
/// presented for SNI and certificate verification.
#[derive(Clone)]
pub struct TlsClient {
    pub config: Arc<rustls::ClientConfig>,
    pub server_name: String,
}

impl std::fmt::Debug for TlsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsClient")
            .field("server_name", &self.server_name)
            .finish()
    }
}

/// Configuration for an outbound connection.
///
/// A `tls` value of `None` selects plain TCP. Any rustls option the
/// underlying transport accepts is passed through unmodified.
#[derive(Clone, Debug)]
pub struct ConnectConfig {
    pub addr: String,
    pub tls: Option<TlsClient>,
}

impl ConnectConfig {
    /// Plain TCP connection to `addr` (`host:port`).
    pub fn tcp(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            tls: None,
        }
    }

    /// TLS connection to `addr`, verifying against `server_name`.
    pub fn tls(
        addr: impl Into<String>,
        config: Arc<rustls::ClientConfig>,
        server_name: impl Into<String>,
    ) -> Self {
        Self {
            addr: addr.into(),
            tls: Some(TlsClient {
                config,
                server_name: server_name.into(),
            }),
        }
    }

    pub fn is_secure(&self) -> bool {
        self.tls.is_some()
    }
}

/// Configuration for a listening socket.
///
/// A `tls` value of `None` selects plain TCP.
#[derive(Clone)]
pub struct ListenConfig {
    pub addr: String,
    pub tls: Option<Arc<rustls::ServerConfig>>,
}

impl ListenConfig {
    /// Listen for plain TCP connections on `addr` (`host:port`).
    pub fn tcp(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            tls: None,
        }
    }

    /// Listen for TLS connections on `addr`.
    pub fn tls(addr: impl Into<String>, config: Arc<rustls::ServerConfig>) -> Self {
        Self {
            addr: addr.into(),
            tls: Some(config),
        }
    }

    pub fn is_secure(&self) -> bool {
        self.tls.is_some()
    }
}

impl std::fmt::Debug for ListenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenConfig")
            .field("addr", &self.addr)
            .field("secure", &self.is_secure())
            .finish()
    }
}

/// Establish an outbound connection, performing the TLS handshake when the
/// configuration requests one.
pub async fn connect(config: &ConnectConfig) -> Result<NetStream> {
    let tcp = TcpStream::connect(&config.addr)
        .await
        .map_err(|source| TransportError::Connect {
            addr: config.addr.clone(),
            source,
        })?;
    tcp.set_nodelay(true)?;

    match &config.tls {
        None => {
            debug!(addr = %config.addr, "connected over tcp");
            Ok(NetStream::from_tcp(tcp))
        }
        Some(tls) => {
            let server_name = rustls::pki_types::ServerName::try_from(tls.server_name.clone())
                .map_err(|_| TransportError::InvalidServerName(tls.server_name.clone()))?;
            let connector = TlsConnector::from(tls.config.clone());
            let stream = connector
                .connect(server_name, tcp)
                .await
                .map_err(TransportError::TlsHandshake)?;
            debug!(addr = %config.addr, server_name = %tls.server_name, "connected over tls");
            Ok(NetStream::from_tls_client(stream))
        }
    }
}

/// Listens for and accepts raw byte-stream connections.
pub struct NetListener {
    listener: TcpListener,
    tls: Option<TlsAcceptor>,
}

impl NetListener {
    /// Bind and listen on the configured address.
    pub async fn bind(config: &ListenConfig) -> Result<Self> {
        let listener =
            TcpListener::bind(&config.addr)
                .await
                .map_err(|source| TransportError::Bind {
                    addr: config.addr.clone(),
                    source,
                })?;
        info!(addr = %config.addr, secure = config.is_secure(), "listening");
        Ok(Self {
            listener,
            tls: config.tls.clone().map(TlsAcceptor::from),
        })
    }

    /// The local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().map_err(TransportError::Io)
    }

    /// Accept an incoming connection, completing the TLS handshake when the
    /// listener is secure.
    pub async fn accept(&self) -> Result<(NetStream, SocketAddr)> {
        let (tcp, addr) = self.listener.accept().await.map_err(TransportError::Accept)?;
        tcp.set_nodelay(true).map_err(TransportError::Accept)?;
        debug!(%addr, "accepted connection");
        match &self.tls {
            None => Ok((NetStream::from_tcp(tcp), addr)),
            Some(acceptor) => {
                let stream = acceptor
                    .accept(tcp)
                    .await
                    .map_err(TransportError::TlsHandshake)?;
                Ok((NetStream::from_tls_server(stream), addr))
            }
        }
    }
}

impl std::fmt::Debug for NetListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetListener")
            .field("secure", &self.tls.is_some())
            .finish()
    }
}
