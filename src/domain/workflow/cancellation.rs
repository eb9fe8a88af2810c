//! Cooperative cancellation shared between the orchestrator and its steps

use tokio::sync::watch;

/// Create a connected handle/signal pair
pub fn cancellation_pair() -> (CancellationHandle, CancellationSignal) {
    let (tx, rx) = watch::channel(false);
    (CancellationHandle { tx }, CancellationSignal { rx })
}

/// Requesting side, held by the orchestrator's live-run registry
#[derive(Debug)]
pub struct CancellationHandle {
    tx: watch::Sender<bool>,
}

impl CancellationHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn signal(&self) -> CancellationSignal {
        CancellationSignal {
            rx: self.tx.subscribe(),
        }
    }
}

/// Observing side, handed to steps and LLM calls
#[derive(Debug, Clone)]
pub struct CancellationSignal {
    rx: watch::Receiver<bool>,
}

impl CancellationSignal {
    /// A signal that never fires
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested. Pends forever if the handle
    /// was dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_cancel_is_observed() {
        let (handle, signal) = cancellation_pair();
        assert!(!signal.is_cancelled());

        handle.cancel();
        assert!(signal.is_cancelled());
        assert!(handle.signal().is_cancelled());
    }

    #[test]
    fn test_never_signal() {
        assert!(!CancellationSignal::never().is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_future_resolves() {
        let (handle, signal) = cancellation_pair();

        let waiter = tokio::spawn(async move { signal.cancelled().await });
        handle.cancel();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("cancelled() should resolve")
            .unwrap();
    }

    #[tokio::test]
    async fn test_dropped_handle_never_resolves() {
        let (handle, signal) = cancellation_pair();
        drop(handle);

        let result = tokio::time::timeout(Duration::from_millis(50), signal.cancelled()).await;
        assert!(result.is_err());
    }
}
