//! TCP/TLS transport abstraction for msgsock.
//!
//! Provides a unified byte-stream interface over plain TCP and TLS:
//! - Plain TCP via tokio
//! - TLS 1.2/1.3 via rustls (selected by supplying a TLS configuration)
//!
//! This is the lowest layer of msgsock. Everything else builds on top of
//! the [`NetStream`] type provided here.

pub mod error;
pub mod net;
pub mod stream;

pub use error::{Result, TransportError};
pub use net::{connect, ConnectConfig, ListenConfig, NetListener, TlsClient};
pub use stream::NetStream;
