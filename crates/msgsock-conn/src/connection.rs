use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use msgsock_frame::{
    encode_frame, FrameError, Framing, JsonCodec, MessageCodec, WriteFilter, DEFAULT_MAX_FRAME,
};
use msgsock_transport::ConnectConfig;

use crate::error::{ConnError, Result};
use crate::event::ConnectionEvent;
use crate::ident::{IdGenerator, RandomId};
use crate::writer::WriteCommand;
use crate::{reader, writer};

/// Default batch window: batched writes issued within this duration of each
/// other coalesce into one underlying write.
pub const DEFAULT_BATCH_WINDOW: Duration = Duration::from_millis(5);

/// Per-connection behaviour configuration.
#[derive(Clone)]
pub struct ConnectionOptions {
    /// How long a batched write may wait before the batch is flushed.
    pub batch_window: Duration,
    /// Wire framing scheme.
    pub framing: Framing,
    /// Maximum accepted frame size, inbound and outbound.
    pub max_frame: usize,
    /// Message serialization.
    pub codec: Arc<dyn MessageCodec>,
    /// Identifier for outbound connections. `None` generates one.
    pub id: Option<String>,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            batch_window: DEFAULT_BATCH_WINDOW,
            framing: Framing::default(),
            max_frame: DEFAULT_MAX_FRAME,
            codec: Arc::new(JsonCodec),
            id: None,
        }
    }
}

impl std::fmt::Debug for ConnectionOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionOptions")
            .field("batch_window", &self.batch_window)
            .field("framing", &self.framing)
            .field("max_frame", &self.max_frame)
            .field("id", &self.id)
            .finish()
    }
}

/// Per-write options.
#[derive(Clone, Default)]
pub struct WriteOptions {
    /// Coalesce this write with others issued within the batch window.
    pub batch: bool,
    /// Text transforms applied after encoding, in order.
    pub filters: Vec<WriteFilter>,
}

impl WriteOptions {
    pub fn batched() -> Self {
        Self {
            batch: true,
            filters: Vec::new(),
        }
    }
}

/// One message-oriented connection over a raw byte stream.
///
/// Wraps the stream with framing, reassembly, and write batching. Decoded
/// messages and connection faults surface through [`next_event`].
///
/// [`next_event`]: Connection::next_event
pub struct Connection {
    id: String,
    connected: Arc<AtomicBool>,
    destroyed: bool,
    framing: Framing,
    max_frame: usize,
    codec: Arc<dyn MessageCodec>,
    commands: mpsc::UnboundedSender<WriteCommand>,
    events: mpsc::UnboundedReceiver<ConnectionEvent>,
    cancel: CancellationToken,
}

impl Connection {
    /// Establish an outbound connection.
    pub async fn connect(config: &ConnectConfig, options: ConnectionOptions) -> Result<Self> {
        let stream = msgsock_transport::connect(config).await?;
        let id = match options.id.clone() {
            Some(id) => id,
            None => RandomId::default().generate(0).await?,
        };
        debug!(%id, addr = %config.addr, "connection established");
        Ok(Self::from_stream(id, stream, options))
    }

    /// Wrap an already-established raw stream with a known identifier.
    pub fn from_stream<S>(id: String, stream: S, options: ConnectionOptions) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        Self::from_split(id, read_half, write_half, Vec::new(), false, options)
    }

    /// Assemble a connection from split halves plus chunks that arrived
    /// before the connection existed. The chunks are replayed through the
    /// reassembler, in arrival order, before live reads begin.
    pub(crate) fn from_split<R, W>(
        id: String,
        read_half: R,
        write_half: W,
        replay: Vec<Bytes>,
        eof_after_replay: bool,
        options: ConnectionOptions,
    ) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(true));
        let cancel = CancellationToken::new();

        reader::spawn_reader(
            read_half,
            options.framing,
            options.max_frame,
            options.codec.clone(),
            replay,
            eof_after_replay,
            event_tx.clone(),
            connected.clone(),
            cancel.clone(),
        );
        writer::spawn_writer(
            write_half,
            options.batch_window,
            command_rx,
            event_tx,
            connected.clone(),
            cancel.clone(),
        );

        Self {
            id,
            connected,
            destroyed: false,
            framing: options.framing,
            max_frame: options.max_frame,
            codec: options.codec,
            commands: command_tx,
            events: event_rx,
            cancel,
        }
    }

    /// This connection's identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// True while the underlying stream is open.
    pub fn connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Write one message immediately.
    pub fn write(&self, value: &Value) -> Result<()> {
        self.write_with(value, &WriteOptions::default())
    }

    /// Serialize any value through serde and write it immediately.
    pub fn write_serialized<T: serde::Serialize>(&self, value: &T) -> Result<()> {
        let value =
            serde_json::to_value(value).map_err(|err| FrameError::Encode(err.to_string()))?;
        self.write(&value)
    }

    /// Write one message with explicit batching and filter options.
    ///
    /// An encode failure aborts only this write; the connection stays
    /// usable. Receive order always equals call order, batched or not:
    /// a non-batched write flushes any pending batch before going out.
    pub fn write_with(&self, value: &Value, options: &WriteOptions) -> Result<()> {
        if !self.connected() {
            return Err(ConnError::Disconnected);
        }

        let mut text = self.codec.encode(value)?;
        for filter in &options.filters {
            text = filter(text);
        }
        if text.len() > self.max_frame {
            return Err(FrameError::FrameTooLarge {
                size: text.len(),
                max: self.max_frame,
            }
            .into());
        }

        let mut framed = BytesMut::new();
        encode_frame(text.as_bytes(), self.framing, &mut framed)?;

        let command = if options.batch {
            WriteCommand::Batched(framed.freeze())
        } else {
            WriteCommand::Direct(framed.freeze())
        };
        self.commands.send(command).map_err(|_| ConnError::Disconnected)
    }

    /// Next notification for this connection. Returns `None` once the
    /// connection is destroyed or all events have been delivered after a
    /// close.
    pub async fn next_event(&mut self) -> Option<ConnectionEvent> {
        if self.destroyed {
            return None;
        }
        self.events.recv().await
    }

    /// Graceful half-close: flush any pending batch, shut down the write
    /// side, keep reading until the peer finishes.
    pub fn end(&self) -> Result<()> {
        self.commands
            .send(WriteCommand::End)
            .map_err(|_| ConnError::Disconnected)
    }

    /// Hard stop: cancel I/O immediately. A pending batch flush is
    /// abandoned and no further message events fire.
    pub fn destroy(&mut self) {
        debug!(id = %self.id, "connection destroyed");
        self.destroyed = true;
        self.connected.store(false, Ordering::SeqCst);
        self.cancel.cancel();
        self.events.close();
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("connected", &self.connected())
            .finish()
    }
}
