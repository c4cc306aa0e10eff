//! Accepting side: binds a listener, assigns each accepted stream an
//! identifier, and promotes it to a [`Connection`].
//!
//! Identifier generation may take arbitrarily long. Bytes the peer sends
//! before the id resolves are buffered in arrival order and replayed
//! through the connection's reassembler, so no early data is lost.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use msgsock_transport::{ListenConfig, NetListener};

use crate::connection::{Connection, ConnectionOptions};
use crate::error::ListenError;
use crate::event::ListenerEvent;
use crate::ident::{IdGenerator, RandomId};

const PROMOTE_READ_CHUNK: usize = 8 * 1024;

/// Accepts connections and hands out promoted [`Connection`]s through
/// [`next_event`].
///
/// [`next_event`]: Listener::next_event
pub struct Listener {
    config: ListenConfig,
    options: ConnectionOptions,
    id_gen: Arc<dyn IdGenerator>,
    cancel: CancellationToken,
    events: Option<mpsc::UnboundedReceiver<ListenerEvent>>,
    local_addr: Option<SocketAddr>,
}

impl Listener {
    pub fn new(config: ListenConfig) -> Self {
        Self {
            config,
            options: ConnectionOptions::default(),
            id_gen: Arc::new(RandomId::default()),
            cancel: CancellationToken::new(),
            events: None,
            local_addr: None,
        }
    }

    /// Use these options for every promoted connection.
    pub fn with_connection_options(mut self, options: ConnectionOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace the default random identifier generator.
    pub fn with_id_generator(mut self, id_gen: Arc<dyn IdGenerator>) -> Self {
        self.id_gen = id_gen;
        self
    }

    /// Bind and start accepting. Events become available afterwards.
    pub async fn listen(&mut self) -> Result<SocketAddr, ListenError> {
        let listener = NetListener::bind(&self.config).await?;
        let addr = listener.local_addr()?;
        self.local_addr = Some(addr);
        debug!(%addr, secure = self.config.is_secure(), "listening");

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        self.events = Some(event_rx);
        tokio::spawn(accept_loop(
            listener,
            self.options.clone(),
            self.id_gen.clone(),
            event_tx,
            self.cancel.clone(),
        ));
        Ok(addr)
    }

    /// Address the listener is bound to, once listening.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Next accepted connection or accept-path failure. Returns `None`
    /// after [`close`] or if [`listen`] was never called.
    ///
    /// [`close`]: Listener::close
    /// [`listen`]: Listener::listen
    pub async fn next_event(&mut self) -> Option<ListenerEvent> {
        let events = self.events.as_mut()?;
        events.recv().await
    }

    /// Stop accepting. Already-promoted connections are unaffected.
    pub fn close(&mut self) {
        self.cancel.cancel();
        if let Some(events) = self.events.as_mut() {
            events.close();
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("addr", &self.config.addr)
            .field("local_addr", &self.local_addr)
            .field("secure", &self.config.is_secure())
            .finish()
    }
}

async fn accept_loop(
    listener: NetListener,
    options: ConnectionOptions,
    id_gen: Arc<dyn IdGenerator>,
    events: mpsc::UnboundedSender<ListenerEvent>,
    cancel: CancellationToken,
) {
    // Per-listener accept counter; feeds the id generator so ids stay
    // unique even when random components collide.
    let accept_seq = AtomicU64::new(0);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let seq = accept_seq.fetch_add(1, Ordering::Relaxed);
                    debug!(%peer, seq, "accepted");
                    tokio::spawn(promote(
                        stream,
                        seq,
                        id_gen.clone(),
                        options.clone(),
                        events.clone(),
                    ));
                }
                Err(err) => {
                    warn!(error = %err, "accept failed");
                    let _ = events.send(ListenerEvent::Error(ListenError::Transport(err)));
                }
            },
        }
    }
}

/// Resolve an identifier for a freshly accepted stream, buffering any bytes
/// the peer sends in the meantime, then hand out the promoted connection
/// with the buffered chunks queued for replay.
pub(crate) async fn promote<S>(
    stream: S,
    seq: u64,
    id_gen: Arc<dyn IdGenerator>,
    options: ConnectionOptions,
    events: mpsc::UnboundedSender<ListenerEvent>,
) where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (mut read_half, write_half) = tokio::io::split(stream);

    let mut replay: Vec<Bytes> = Vec::new();
    let mut eof = false;
    let mut generate = Box::pin(id_gen.generate(seq));

    let id = loop {
        let mut chunk = BytesMut::with_capacity(PROMOTE_READ_CHUNK);
        tokio::select! {
            generated = &mut generate => match generated {
                Ok(id) => break id,
                Err(err) => {
                    warn!(seq, error = %err, "identifier generation failed");
                    let _ = events.send(ListenerEvent::Error(err.into()));
                    return;
                }
            },
            read = read_half.read_buf(&mut chunk), if !eof => match read {
                Ok(0) => eof = true,
                Ok(_) => replay.push(chunk.freeze()),
                Err(err) => {
                    // Keep waiting for the id; the read error surfaces as a
                    // close once the connection exists.
                    debug!(seq, error = %err, "read failed during promotion");
                    eof = true;
                }
            },
        }
    };

    debug!(seq, %id, buffered = replay.len(), "promoted");
    let connection = Connection::from_split(id, read_half, write_half, replay, eof, options);
    let _ = events.send(ListenerEvent::Connection(connection));
}
