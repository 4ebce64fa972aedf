//! Caller-driven cancellation and per-call timeouts for remote calls

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::{Error, Result};

/// Held by whoever may abort an in-flight reconciliation
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Observed by the reconciler around every remote call
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
    timeout: Option<Duration>,
}

/// A connected handle and signal, not yet cancelled
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (
        CancelHandle { tx: Arc::new(tx) },
        CancelSignal { rx, timeout: None },
    )
}

impl CancelSignal {
    /// A signal nobody can trigger
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx, timeout: None }
    }

    /// Bound every call run through this signal by `limit`
    pub fn with_timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // handle dropped without cancelling
                std::future::pending::<()>().await;
            }
        }
    }

    /// Run one remote call, giving up with [`Error::Cancelled`] or
    /// [`Error::Timeout`] if the signal fires or the limit passes first.
    /// An already cancelled signal never starts the call.
    pub async fn run<F, T>(&self, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let raced = async {
            tokio::select! {
                biased;
                _ = self.cancelled() => Err(Error::Cancelled),
                out = call => out,
            }
        };

        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, raced)
                .await
                .map_err(|_| Error::Timeout(limit))?,
            None => raced.await,
        }
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::never()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn test_never_runs_to_completion() {
        let out = CancelSignal::never().run(async { Ok(7) }).await.unwrap();
        assert_eq!(out, 7);
    }

    #[tokio::test]
    async fn test_cancelled_signal_skips_call() {
        let (handle, signal) = cancel_pair();
        handle.cancel();

        let started = AtomicBool::new(false);
        let result = signal
            .run(async {
                started.store(true, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(!started.load(Ordering::SeqCst));
        assert!(signal.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_inflight_call() {
        let (handle, signal) = cancel_pair();

        let (result, _) = tokio::join!(
            signal.run(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            }),
            async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                handle.cancel();
            }
        );

        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout() {
        let signal = CancelSignal::never().with_timeout(Duration::from_secs(5));
        let result = signal
            .run(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .await;

        match result {
            Err(Error::Timeout(limit)) => assert_eq!(limit, Duration::from_secs(5)),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_call_errors_pass_through() {
        let result: Result<()> = CancelSignal::never()
            .run(async { Err(Error::rejection(400, "unknown cluster")) })
            .await;
        assert!(matches!(result, Err(Error::RemoteRejection { status: 400, .. })));
    }
}
