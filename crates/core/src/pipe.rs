//! Bounded in-memory byte channel bridging a stream reader and a stream
//! writer running on different tasks.
//!
//! Exactly one writer and one reader operate on a given pipe. The channel
//! holds at most a fixed number of chunks, so the producer cannot run
//! arbitrarily far ahead of the consumer; this is the backpressure
//! mechanism of every transfer. Closing either side unblocks the other:
//! the reader observes end-of-stream (or the recorded abort error) and the
//! writer observes `ClosedPipe`, never silent data loss.

use crate::error::{TransferError, TransferResult};
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Create a chunk pipe buffering up to `capacity` chunks.
pub fn chunk_pipe(capacity: usize) -> (PipeWriter, PipeReader) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        PipeWriter { tx },
        PipeReader {
            rx,
            pending: Bytes::new(),
        },
    )
}

/// Write side of a chunk pipe. Closing is consuming, so a write after
/// close is structurally impossible.
pub struct PipeWriter {
    tx: mpsc::Sender<TransferResult<Bytes>>,
}

impl PipeWriter {
    /// Write one chunk, suspending while the pipe is full. Empty chunks
    /// are dropped so that the reader never confuses them with
    /// end-of-stream. Fails with `ClosedPipe` once the reader is gone.
    pub async fn write(&mut self, chunk: Bytes) -> TransferResult<()> {
        if chunk.is_empty() {
            return Ok(());
        }
        self.tx
            .send(Ok(chunk))
            .await
            .map_err(|_| TransferError::ClosedPipe)
    }

    /// Close the write side, signalling end-of-stream to the reader after
    /// it drains any buffered chunks.
    pub fn close(self) {}

    /// Close the write side with a terminal error. The reader observes the
    /// error after draining buffered chunks. Ignored if the reader is
    /// already gone.
    pub async fn abort(self, err: TransferError) {
        let _ = self.tx.send(Err(err)).await;
    }
}

/// Read side of a chunk pipe.
///
/// Yields chunks as a `Stream`, or bytes through [`PipeReader::read`] for
/// byte-oriented consumers. Dropping the reader unblocks a suspended
/// writer with `ClosedPipe`.
#[derive(Debug)]
pub struct PipeReader {
    rx: mpsc::Receiver<TransferResult<Bytes>>,
    pending: Bytes,
}

impl PipeReader {
    /// Fill `buf` with up to `buf.len()` bytes. Returns `Ok(0)` only at
    /// end-of-stream (write side closed and all buffered bytes drained).
    pub async fn read(&mut self, buf: &mut [u8]) -> TransferResult<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        while self.pending.is_empty() {
            match self.rx.recv().await {
                Some(Ok(chunk)) => self.pending = chunk,
                Some(Err(err)) => return Err(err),
                None => return Ok(0),
            }
        }

        let n = self.pending.len().min(buf.len());
        buf[..n].copy_from_slice(&self.pending.split_to(n));
        Ok(n)
    }
}

impl Stream for PipeReader {
    type Item = TransferResult<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if !self.pending.is_empty() {
            let chunk = std::mem::take(&mut self.pending);
            return Poll::Ready(Some(Ok(chunk)));
        }
        self.rx.poll_recv(cx)
    }
}
