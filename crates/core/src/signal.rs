//! One-shot transfer outcome channel.
//!
//! A transfer runs as two tasks: one pumps bytes, the other drives storage
//! or the RPC stream. The pumping task reports its terminal outcome here
//! exactly once; sending consumes the sender, so a second report is a
//! compile error rather than a runtime race.

use crate::error::{TransferError, TransferResult};
use tokio::sync::oneshot;

/// Create a linked outcome sender/receiver pair for one transfer.
pub fn error_signal() -> (SignalSender, SignalReceiver) {
    let (tx, rx) = oneshot::channel();
    (SignalSender { tx }, SignalReceiver { rx })
}

/// Held by the task that pumps bytes; reports its terminal outcome once.
pub struct SignalSender {
    tx: oneshot::Sender<TransferResult<()>>,
}

impl SignalSender {
    /// Report successful completion.
    pub fn finish(self) {
        let _ = self.tx.send(Ok(()));
    }

    /// Report failure. The receiver observes exactly this error.
    pub fn fail(self, err: TransferError) {
        let _ = self.tx.send(Err(err));
    }
}

/// Held by the task awaiting the pump outcome.
pub struct SignalReceiver {
    rx: oneshot::Receiver<TransferResult<()>>,
}

impl SignalReceiver {
    /// Wait for the pump task's outcome. If the task was torn down before
    /// reporting, the transfer counts as cancelled rather than successful.
    pub async fn wait(self) -> TransferResult<()> {
        match self.rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(TransferError::Cancelled(
                "transfer task stopped before completion".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn finish_is_observed_as_ok() {
        let (tx, rx) = error_signal();
        tx.finish();
        assert!(rx.wait().await.is_ok());
    }

    #[tokio::test]
    async fn fail_delivers_the_error() {
        let (tx, rx) = error_signal();
        tx.fail(TransferError::StorageWriteFailed("disk full".to_string()));
        let err = rx.wait().await.unwrap_err();
        assert!(matches!(err, TransferError::StorageWriteFailed(_)));
    }

    #[tokio::test]
    async fn dropped_sender_counts_as_cancelled() {
        let (tx, rx) = error_signal();
        drop(tx);
        let err = rx.wait().await.unwrap_err();
        assert!(matches!(err, TransferError::Cancelled(_)));
    }
}
