//! # Debouncer
//!
//! Collapses a burst of calls into the last one. Each call cancels the pending
//! one's token and schedules itself after `delay`; only a call that survives
//! the whole window runs.
//!
//! Calls made outside a tokio runtime cannot be scheduled. They are logged and
//! dropped, and whatever was pending is cancelled as usual.

use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

pub struct Debouncer {
    delay: Duration,
    pending: Mutex<Option<CancellationToken>>,
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

    /// Schedules `action`, replacing whatever was pending. Returns `None` when
    /// there is no runtime to run it on.
    pub fn call<F>(&self, action: F) -> Option<JoinHandle<()>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(err) => {
                log::warn!("Debounced call dropped, no runtime: {err}");
                self.cancel();
                return None;
            }
        };

        let token = CancellationToken::new();
        if let Some(previous) = self.lock().replace(token.clone()) {
            previous.cancel();
        }

        let delay = self.delay;
        let finished = token.clone();
        Some(runtime.spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    log::trace!("Debounced call superseded.");
                }
                _ = sleep(delay) => {
                    action.await;
                    finished.cancel();
                }
            }
        }))
    }

    /// Drops the pending call, if any.
    pub fn cancel(&self) {
        if let Some(pending) = self.lock().take() {
            pending.cancel();
        }
    }

    /// Whether a scheduled call has neither run nor been superseded.
    pub fn is_pending(&self) -> bool {
        self.lock().as_ref().is_some_and(|token| !token.is_cancelled())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<CancellationToken>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counter_action(counter: &Arc<AtomicUsize>) -> impl Future<Output = ()> + Send + 'static {
        let counter = Arc::clone(counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn burst_collapses_to_one_call() {
        let debouncer = Debouncer::new(Duration::from_millis(100));
        let counter = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..5 {
            handles.push(debouncer.call(counter_action(&counter)).unwrap());
            tokio::time::advance(Duration::from_millis(20)).await;
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn calls_outside_the_window_all_run() {
        let debouncer = Debouncer::new(Duration::from_millis(100));
        let counter = Arc::new(AtomicUsize::new(0));

        debouncer.call(counter_action(&counter)).unwrap().await.unwrap();
        debouncer.call(counter_action(&counter)).unwrap().await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_pending_call() {
        let debouncer = Debouncer::new(Duration::from_millis(100));
        let counter = Arc::new(AtomicUsize::new(0));

        let handle = debouncer.call(counter_action(&counter)).unwrap();
        assert!(debouncer.is_pending());
        debouncer.cancel();
        handle.await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(!debouncer.is_pending());
    }

    #[test]
    fn call_outside_a_runtime_is_dropped() {
        let debouncer = Debouncer::new(Duration::from_millis(100));
        let counter = Arc::new(AtomicUsize::new(0));

        assert!(debouncer.call(counter_action(&counter)).is_none());
        assert!(!debouncer.is_pending());
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
