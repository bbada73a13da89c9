//! Concurrency ceiling for outbound media requests.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Semaphore;

/// Default number of media requests allowed in flight at once.
pub const DEFAULT_MAX_CONCURRENT: usize = 2;

/// Bounds in-flight operations; overflow waits in a FIFO queue.
///
/// One gate is shared (behind an `Arc`) by every client of a session. The
/// semaphore is fair, so waiting operations start in submission order and
/// none is dropped. A slot is released when its operation settles, including
/// when the operation future is dropped.
#[derive(Debug)]
pub struct RequestGate {
    semaphore: Semaphore,
    max_concurrent: usize,
    active: AtomicUsize,
    queued: AtomicUsize,
}

struct CounterGuard<'a>(&'a AtomicUsize);

impl<'a> CounterGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for CounterGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RequestGate {
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            semaphore: Semaphore::new(max_concurrent),
            max_concurrent,
            active: AtomicUsize::new(0),
            queued: AtomicUsize::new(0),
        }
    }

    /// Run `operation` once a slot is free.
    pub async fn submit<F, Fut, T>(&self, operation: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let waiting = CounterGuard::enter(&self.queued);
        // The semaphore is owned by the gate and never closed.
        let _permit = self.semaphore.acquire().await.ok();
        drop(waiting);

        let _slot = CounterGuard::enter(&self.active);
        operation().await
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Operations currently executing.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Operations waiting for a slot.
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }
}

impl Default for RequestGate {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_never_more_than_ceiling_active() {
        let gate = Arc::new(RequestGate::new(2));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..7)
            .map(|i| {
                let gate = gate.clone();
                let peak = peak.clone();
                tokio::spawn(async move {
                    gate.submit(|| async {
                        peak.fetch_max(gate.active(), Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50 + i * 10)).await;
                        i
                    })
                    .await
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 2);
        assert_eq!(gate.active(), 0);
        assert_eq!(gate.queued(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_operations_start_in_submission_order() {
        let gate = RequestGate::new(1);
        let started = Mutex::new(Vec::new());

        let ops = (0..5).map(|i| {
            let gate = &gate;
            let started = &started;
            async move {
                gate.submit(|| async move {
                    started.lock().unwrap().push(i);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                })
                .await
            }
        });
        futures::future::join_all(ops).await;

        assert_eq!(*started.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_failed_operation_releases_slot() {
        let gate = RequestGate::new(1);

        let first: Result<(), &str> = gate.submit(|| async { Err("boom") }).await;
        assert!(first.is_err());

        let second: Result<u8, &str> = gate.submit(|| async { Ok(7) }).await;
        assert_eq!(second, Ok(7));
        assert_eq!(gate.active(), 0);
    }

    #[test]
    fn test_zero_ceiling_is_clamped() {
        assert_eq!(RequestGate::new(0).max_concurrent(), 1);
        assert_eq!(RequestGate::default().max_concurrent(), 2);
    }
}
