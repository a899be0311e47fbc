//! Transfer relay cores.
//!
//! Each transfer runs exactly two tasks joined by a chunk pipe: one moves
//! bytes over the RPC stream, the other drives the storage backend. The
//! upload path additionally carries a one-shot completion signal so that
//! a stream-side failure is never masked by whatever the storage side
//! reports after losing its data source.

use bytes::Bytes;
use ferry_core::{
    CHUNK_SIZE, PIPE_DEPTH, PipeReader, TransferError, TransferHeader, TransferResult, chunk_pipe,
    error_signal,
};
use ferry_storage::ObjectStore;
use futures::{Stream, StreamExt};
use std::sync::Arc;
use tracing::instrument;

/// Relay an upload stream into storage. Returns the committed size.
///
/// The drain task moves fragments from `chunks` into the pipe while this
/// function streams them into a storage upload. The upload commits only
/// when the stream ends cleanly; a stream error aborts the upload and is
/// reported in preference to any secondary storage failure it caused.
#[instrument(skip(store, chunks), fields(namespace = %header.namespace, path = %header.path))]
pub async fn upload<S>(
    store: Arc<dyn ObjectStore>,
    header: &TransferHeader,
    chunks: S,
) -> TransferResult<u64>
where
    S: Stream<Item = TransferResult<Bytes>> + Send + 'static,
{
    let (mut writer, mut reader) = chunk_pipe(PIPE_DEPTH);
    let (signal_tx, signal_rx) = error_signal();

    tokio::spawn(async move {
        futures::pin_mut!(chunks);
        loop {
            match chunks.next().await {
                Some(Ok(chunk)) => {
                    if writer.write(chunk).await.is_err() {
                        // The storage side released the pipe first; its own
                        // error is authoritative, so record a clean drain.
                        signal_tx.finish();
                        return;
                    }
                }
                Some(Err(err)) => {
                    writer
                        .abort(TransferError::StreamReceiveFailed(err.to_string()))
                        .await;
                    signal_tx.fail(err);
                    return;
                }
                None => {
                    writer.close();
                    signal_tx.finish();
                    return;
                }
            }
        }
    });

    let put_result: TransferResult<u64> = async {
        let mut upload = store
            .put_stream(&header.namespace, &header.path)
            .await
            .map_err(|e| e.into_write_error())?;

        loop {
            match reader.next().await {
                Some(Ok(chunk)) => {
                    if let Err(err) = upload.write(chunk).await {
                        let write_err = err.into_write_error();
                        if let Err(abort_err) = upload.abort().await {
                            tracing::warn!(error = %abort_err, "upload abort failed");
                        }
                        return Err(write_err);
                    }
                }
                Some(Err(err)) => {
                    if let Err(abort_err) = upload.abort().await {
                        tracing::warn!(error = %abort_err, "upload abort failed");
                    }
                    return Err(err);
                }
                None => return upload.finish().await.map_err(|e| e.into_write_error()),
            }
        }
    }
    .await;

    // Releasing the reader unblocks a drain still filling the pipe
    drop(reader);

    signal_rx.wait().await?;
    put_result
}

/// Open a download and return its chunk pipe reader.
///
/// The storage read is opened before this function returns, so a missing
/// object fails here instead of after the first response fragment. The
/// pump task then copies the object into the pipe in fragments of at most
/// [`CHUNK_SIZE`], stopping as soon as the reader is dropped.
#[instrument(skip(store), fields(namespace = %header.namespace, path = %header.path))]
pub async fn download(
    store: Arc<dyn ObjectStore>,
    header: &TransferHeader,
) -> TransferResult<PipeReader> {
    let mut source = store
        .get_stream(&header.namespace, &header.path)
        .await
        .map_err(|e| e.into_read_error())?;

    let (mut writer, reader) = chunk_pipe(PIPE_DEPTH);

    tokio::spawn(async move {
        loop {
            match source.next().await {
                Some(Ok(mut chunk)) => {
                    while !chunk.is_empty() {
                        let fragment = chunk.split_to(chunk.len().min(CHUNK_SIZE));
                        if writer.write(fragment).await.is_err() {
                            // Consumer is gone; nothing left to report to.
                            return;
                        }
                    }
                }
                Some(Err(err)) => {
                    writer.abort(err.into_read_error()).await;
                    return;
                }
                None => {
                    writer.close();
                    return;
                }
            }
        }
    });

    Ok(reader)
}
