//! Cooperative cancellation for background work.
//!
//! A [`CancelHandle`] is kept by whoever owns the task; the matching
//! [`CancelToken`] travels into the task and is raced against every
//! suspension point that may take long (subprocess waits).

use tokio::sync::watch;

/// Owner side: flips the shared flag.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

/// Task side: observes the shared flag.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

/// Create a connected handle/token pair.
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx })
}

impl CancelHandle {
    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl CancelToken {
    /// A token that is never cancelled.
    pub fn never() -> Self {
        // A dropped handle can no longer cancel.
        let (_, token) = cancel_pair();
        token
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once cancellation is requested.
    ///
    /// If the handle is dropped without cancelling, this never resolves.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                if *self.rx.borrow() {
                    return;
                }
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancel_resolves_waiter() {
        let (handle, mut token) = cancel_pair();
        assert!(!token.is_cancelled());

        let waiter = tokio::spawn(async move {
            token.cancelled().await;
            true
        });
        handle.cancel();

        let done = tokio::time::timeout(Duration::from_secs(2), waiter).await;
        assert!(matches!(done, Ok(Ok(true))));
    }

    #[tokio::test]
    async fn test_cancel_survives_handle_drop() {
        let (handle, mut token) = cancel_pair();
        handle.cancel();
        drop(handle);
        assert!(token.is_cancelled());
        tokio::time::timeout(Duration::from_secs(1), token.cancelled())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_dropped_handle_never_cancels() {
        let (handle, mut token) = cancel_pair();
        drop(handle);
        let waited = tokio::time::timeout(Duration::from_millis(50), token.cancelled()).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn test_never_token() {
        let mut token = CancelToken::never();
        let waited = tokio::time::timeout(Duration::from_millis(20), token.cancelled()).await;
        assert!(waited.is_err());
    }
}
