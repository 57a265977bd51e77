use std::future::Future;

use tokio::sync::watch;

use crate::{StoreError, StoreResult};

/// Caller-side switch that cancels every [`CancelToken`] cloned from its pair.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

#[derive(Clone, Debug)]
pub struct CancelToken {
    rx: Option<watch::Receiver<bool>>,
}

pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx: Some(rx) })
}

impl CancelToken {
    /// A token that is never cancelled.
    pub fn never() -> Self {
        Self { rx: None }
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    pub fn check(&self, op: &str) -> StoreResult<()> {
        if self.is_cancelled() {
            Err(StoreError::cancelled(op.to_string()))
        } else {
            Ok(())
        }
    }

    /// Resolves once cancelled. A dropped handle leaves the token pending forever.
    pub async fn cancelled(&self) {
        let Some(rx) = self.rx.as_ref() else {
            return std::future::pending().await;
        };
        let mut rx = rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return std::future::pending().await;
            }
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::never()
    }
}

/// Races `fut` against `token`. On cancellation `fut` is dropped, which rolls
/// back any transaction it still holds open.
pub async fn run_cancellable<T, F>(token: &CancelToken, op: &str, fut: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    token.check(op)?;
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(StoreError::cancelled(op.to_string())),
        result = fut => result,
    }
}
