//! Trailing-edge debounce for background actions.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Coalesces bursts of triggers into one action run after a quiet period.
///
/// Each [`Debouncer::trigger`] restarts the timer; only the action of the last
/// trigger in a burst runs. An action that has already started is left to
/// finish. [`Debouncer::cancel`] drops the pending action.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    pending: Mutex<Option<Scheduled>>,
}

#[derive(Debug)]
struct Scheduled {
    handle: JoinHandle<()>,
    started: Arc<AtomicBool>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Mutex::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    fn pending(&self) -> MutexGuard<'_, Option<Scheduled>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn trigger<F, Fut>(&self, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let delay = self.delay;
        let mut pending = self.pending();
        if let Some(previous) = pending.take() {
            if !previous.started.load(Ordering::SeqCst) {
                previous.handle.abort();
            }
        }

        let started = Arc::new(AtomicBool::new(false));
        let flag = started.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            flag.store(true, Ordering::SeqCst);
            action().await;
        });
        *pending = Some(Scheduled { handle, started });
    }

    /// Whether an action is scheduled or running.
    pub fn is_pending(&self) -> bool {
        self.pending()
            .as_ref()
            .map(|scheduled| !scheduled.handle.is_finished())
            .unwrap_or(false)
    }

    /// Abort the latest action, whether it is still waiting or already running.
    pub fn cancel(&self) {
        if let Some(scheduled) = self.pending().take() {
            scheduled.handle.abort();
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
