//! Inbound read task: pumps raw stream chunks through the reassembler and
//! emits decoded messages in arrival order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use msgsock_frame::{FrameDecoder, FrameError, Framing, MessageCodec};

use crate::event::ConnectionEvent;

const READ_CHUNK_SIZE: usize = 8 * 1024;

#[allow(clippy::too_many_arguments)]
pub(crate) fn spawn_reader<R>(
    mut source: R,
    framing: Framing,
    max_frame: usize,
    codec: Arc<dyn MessageCodec>,
    replay: Vec<Bytes>,
    eof_after_replay: bool,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    connected: Arc<AtomicBool>,
    cancel: CancellationToken,
) where
    R: AsyncRead + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        let mut decoder = FrameDecoder::new(framing, max_frame);

        // Chunks that arrived before the connection existed (the id was
        // still resolving) are fed through the same path as live reads, in
        // their original arrival order.
        for chunk in replay {
            decoder.extend(&chunk);
            if !drain_frames(&mut decoder, codec.as_ref(), &events) {
                finish(&events, &connected);
                return;
            }
        }
        if eof_after_replay {
            finish(&events, &connected);
            return;
        }

        loop {
            let mut chunk = BytesMut::with_capacity(READ_CHUNK_SIZE);
            tokio::select! {
                _ = cancel.cancelled() => return,
                result = source.read_buf(&mut chunk) => match result {
                    Ok(0) => break,
                    Ok(_) => {
                        decoder.extend(&chunk);
                        if !drain_frames(&mut decoder, codec.as_ref(), &events) {
                            break;
                        }
                    }
                    Err(err) => {
                        debug!(error = %err, "read failed");
                        let _ = events.send(ConnectionEvent::Error(err.into()));
                        break;
                    }
                },
            }
        }
        finish(&events, &connected);
    });
}

/// Deliver every complete buffered frame. A per-frame decode failure is
/// reported and reassembly continues; a framing fault (the stream can no
/// longer be resynced) is reported, ends the connection, and returns false.
fn drain_frames(
    decoder: &mut FrameDecoder,
    codec: &dyn MessageCodec,
    events: &mpsc::UnboundedSender<ConnectionEvent>,
) -> bool {
    loop {
        match decoder.next_frame() {
            Ok(Some(frame)) => {
                let event = match decode_message(codec, &frame) {
                    Ok(value) => ConnectionEvent::Message(value),
                    Err(err) => ConnectionEvent::Error(err.into()),
                };
                let _ = events.send(event);
            }
            Ok(None) => return true,
            Err(err) => {
                let _ = events.send(ConnectionEvent::Error(err.into()));
                return false;
            }
        }
    }
}

fn decode_message(
    codec: &dyn MessageCodec,
    frame: &Bytes,
) -> Result<serde_json::Value, FrameError> {
    let text = std::str::from_utf8(frame)?;
    codec.decode(text)
}

fn finish(events: &mpsc::UnboundedSender<ConnectionEvent>, connected: &Arc<AtomicBool>) {
    connected.store(false, Ordering::SeqCst);
    let _ = events.send(ConnectionEvent::Closed);
}
