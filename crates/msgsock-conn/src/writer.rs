//! Outbound write task: serializes direct writes, coalesces batched writes
//! within one batch window, and flushes the batch as a single underlying
//! write.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::ConnError;
use crate::event::ConnectionEvent;

/// Commands accepted by the write task. Payloads arrive already framed.
pub(crate) enum WriteCommand {
    /// Write immediately. Any pending batch buffer is flushed first so the
    /// wire order always matches the call order.
    Direct(Bytes),
    /// Append to the batch buffer; arm the flush timer if not armed.
    Batched(Bytes),
    /// Flush pending output and shut down the write side (half-close).
    End,
}

// Placeholder deadline while no flush is armed; that select branch is
// disabled, so the timer is never registered.
const IDLE_DEADLINE: Duration = Duration::from_secs(3600);

pub(crate) fn spawn_writer<W>(
    mut sink: W,
    batch_window: Duration,
    mut commands: mpsc::UnboundedReceiver<WriteCommand>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    connected: Arc<AtomicBool>,
    cancel: CancellationToken,
) where
    W: AsyncWrite + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        let mut batch = BytesMut::new();
        let mut flush_at: Option<Instant> = None;

        loop {
            let deadline = flush_at.unwrap_or_else(|| Instant::now() + IDLE_DEADLINE);
            tokio::select! {
                // Destroyed: abandon any pending batch without writing it.
                _ = cancel.cancelled() => return,

                command = commands.recv() => match command {
                    Some(WriteCommand::Direct(frame)) => {
                        if !flush_pending(&mut sink, &mut batch, &mut flush_at, &events).await {
                            break;
                        }
                        if !write_frame(&mut sink, &frame, &events).await {
                            break;
                        }
                    }
                    Some(WriteCommand::Batched(frame)) => {
                        batch.extend_from_slice(&frame);
                        // One pending flush at most; later batched writes
                        // within the window coalesce into it.
                        if flush_at.is_none() {
                            flush_at = Some(Instant::now() + batch_window);
                        }
                    }
                    Some(WriteCommand::End) => {
                        let _ = flush_pending(&mut sink, &mut batch, &mut flush_at, &events).await;
                        if let Err(err) = sink.shutdown().await {
                            let _ = events.send(ConnectionEvent::Error(ConnError::Io(err)));
                        }
                        debug!("write side shut down");
                        break;
                    }
                    None => {
                        // All handles dropped; best-effort final flush.
                        let _ = flush_pending(&mut sink, &mut batch, &mut flush_at, &events).await;
                        break;
                    }
                },

                _ = tokio::time::sleep_until(deadline), if flush_at.is_some() => {
                    if !flush_pending(&mut sink, &mut batch, &mut flush_at, &events).await {
                        break;
                    }
                }
            }
        }
        connected.store(false, Ordering::SeqCst);
    });
}

/// Write the accumulated batch as one underlying write and disarm the
/// timer. Returns false on a write failure.
async fn flush_pending<W: AsyncWrite + Unpin>(
    sink: &mut W,
    batch: &mut BytesMut,
    flush_at: &mut Option<Instant>,
    events: &mpsc::UnboundedSender<ConnectionEvent>,
) -> bool {
    *flush_at = None;
    if batch.is_empty() {
        return true;
    }
    let pending = batch.split().freeze();
    write_frame(sink, &pending, events).await
}

async fn write_frame<W: AsyncWrite + Unpin>(
    sink: &mut W,
    bytes: &Bytes,
    events: &mpsc::UnboundedSender<ConnectionEvent>,
) -> bool {
    let result = async {
        sink.write_all(bytes).await?;
        sink.flush().await
    }
    .await;

    match result {
        Ok(()) => true,
        Err(err) => {
            let _ = events.send(ConnectionEvent::Error(ConnError::Io(err)));
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::pin::Pin;
    use std::sync::Mutex;
    use std::task::{Context, Poll};

    use super::*;

    /// Records each underlying write call separately so tests can observe
    /// batching behaviour.
    #[derive(Clone, Default)]
    struct RecordingSink {
        writes: Arc<Mutex<Vec<Vec<u8>>>>,
        shutdown: Arc<AtomicBool>,
    }

    impl RecordingSink {
        fn writes(&self) -> Vec<Vec<u8>> {
            self.writes.lock().unwrap().clone()
        }
    }

    impl AsyncWrite for RecordingSink {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            self.writes.lock().unwrap().push(buf.to_vec());
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            self.shutdown.store(true, Ordering::SeqCst);
            Poll::Ready(Ok(()))
        }
    }

    fn start_writer(
        window: Duration,
    ) -> (
        RecordingSink,
        mpsc::UnboundedSender<WriteCommand>,
        CancellationToken,
    ) {
        let sink = RecordingSink::default();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, _event_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        spawn_writer(
            sink.clone(),
            window,
            cmd_rx,
            event_tx,
            Arc::new(AtomicBool::new(true)),
            cancel.clone(),
        );
        (sink, cmd_tx, cancel)
    }

    #[tokio::test(start_paused = true)]
    async fn batched_writes_coalesce_into_one_underlying_write() {
        let (sink, cmd_tx, _cancel) = start_writer(Duration::from_millis(5));

        cmd_tx.send(WriteCommand::Batched(Bytes::from_static(b"aa"))).unwrap();
        cmd_tx.send(WriteCommand::Batched(Bytes::from_static(b"bb"))).unwrap();
        cmd_tx.send(WriteCommand::Batched(Bytes::from_static(b"cc"))).unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(sink.writes(), vec![b"aabbcc".to_vec()]);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_batches_reuse_the_pending_flush() {
        let (sink, cmd_tx, _cancel) = start_writer(Duration::from_millis(5));

        cmd_tx.send(WriteCommand::Batched(Bytes::from_static(b"x"))).unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
        cmd_tx.send(WriteCommand::Batched(Bytes::from_static(b"y"))).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        // The second batched write landed inside the first window: one
        // flush, not two.
        assert_eq!(sink.writes(), vec![b"xy".to_vec()]);
    }

    #[tokio::test(start_paused = true)]
    async fn direct_write_flushes_pending_batch_first() {
        let (sink, cmd_tx, _cancel) = start_writer(Duration::from_millis(5));

        cmd_tx.send(WriteCommand::Batched(Bytes::from_static(b"batched"))).unwrap();
        cmd_tx.send(WriteCommand::Direct(Bytes::from_static(b"direct"))).unwrap();

        tokio::time::sleep(Duration::from_millis(1)).await;

        assert_eq!(sink.writes(), vec![b"batched".to_vec(), b"direct".to_vec()]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_abandons_pending_batch() {
        let (sink, cmd_tx, cancel) = start_writer(Duration::from_millis(5));

        cmd_tx.send(WriteCommand::Batched(Bytes::from_static(b"doomed"))).unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        cancel.cancel();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(sink.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn end_flushes_then_shuts_down() {
        let (sink, cmd_tx, _cancel) = start_writer(Duration::from_millis(5));

        cmd_tx.send(WriteCommand::Batched(Bytes::from_static(b"tail"))).unwrap();
        cmd_tx.send(WriteCommand::End).unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert_eq!(sink.writes(), vec![b"tail".to_vec()]);
        assert!(sink.shutdown.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn timer_flush_clears_buffer_for_next_window() {
        let (sink, cmd_tx, _cancel) = start_writer(Duration::from_millis(5));

        cmd_tx.send(WriteCommand::Batched(Bytes::from_static(b"first"))).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        cmd_tx.send(WriteCommand::Batched(Bytes::from_static(b"second"))).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(sink.writes(), vec![b"first".to_vec(), b"second".to_vec()]);
    }
}
