//! Cooperative cancellation for a pipeline run.
//!
//! A [`CancellationHandle`] is cheap to clone; hand one clone to the run (via
//! [`crate::config::ArticleConfigBuilder::cancellation`]) and keep another to
//! call [`CancellationHandle::cancel`] from a signal handler or UI thread.
//! The run stops issuing calls, drops any in-flight request, and returns
//! what it already has.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Shared cancellation flag with an awaitable signal.
#[derive(Debug, Clone, Default)]
pub struct CancellationHandle {
    inner: Arc<Inner>,
}

impl CancellationHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a concurrent cancel() is not missed.
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}
