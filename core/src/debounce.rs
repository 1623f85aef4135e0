// core/src/debounce.rs
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Default quiescence interval for repository input.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Delays a rapidly changing value until it has been quiet for `interval`.
///
/// Every `update` bumps a token and schedules an emission tagged with it.
/// A scheduled emission only goes out if its token is still the latest one,
/// so superseded timers are no-ops even if they race the abort.
pub struct Debouncer<T> {
    interval: Duration,
    token: Arc<AtomicU64>,
    pending: Option<JoinHandle<()>>,
    tx: mpsc::UnboundedSender<T>,
}

impl<T: Send + 'static> Debouncer<T> {
    /// Creates a debouncer and the receiver its settled values arrive on.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(interval: Duration) -> (Self, mpsc::UnboundedReceiver<T>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let debouncer = Self {
            interval,
            token: Arc::new(AtomicU64::new(0)),
            pending: None,
            tx,
        };
        (debouncer, rx)
    }

    /// Records a new value and restarts the quiescence wait.
    pub fn update(&mut self, value: T) {
        let token = self.token.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(handle) = self.pending.take() {
            handle.abort();
        }

        let current = Arc::clone(&self.token);
        let tx = self.tx.clone();
        let deadline = Instant::now() + self.interval;

        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if current.load(Ordering::SeqCst) == token {
                // receiver gone means the consumer is gone too
                let _ = tx.send(value);
            }
        }));
    }

    /// Discards any pending emission. Later updates still work.
    pub fn cancel(&mut self) {
        self.token.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        self.token.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    const QUIET: Duration = Duration::from_millis(500);

    async fn settle() {
        // let spawned timer tasks observe the advanced clock
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_coalesces_rapid_updates() {
        let (mut debouncer, mut rx) = Debouncer::new(QUIET);

        debouncer.update("a".to_string());
        advance(Duration::from_millis(100)).await;
        debouncer.update("ab".to_string());
        advance(Duration::from_millis(100)).await;
        debouncer.update("abc".to_string());

        advance(QUIET).await;
        settle().await;

        assert_eq!(rx.try_recv().ok(), Some("abc".to_string()));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_emission_before_interval() {
        let (mut debouncer, mut rx) = Debouncer::new(QUIET);

        debouncer.update(1u32);
        advance(Duration::from_millis(499)).await;
        settle().await;
        assert!(rx.try_recv().is_err());

        advance(Duration::from_millis(1)).await;
        settle().await;
        assert_eq!(rx.try_recv().ok(), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restartable() {
        let (mut debouncer, mut rx) = Debouncer::new(QUIET);

        debouncer.update(1u32);
        advance(QUIET).await;
        settle().await;
        debouncer.update(2u32);
        advance(QUIET).await;
        settle().await;

        assert_eq!(rx.try_recv().ok(), Some(1));
        assert_eq!(rx.try_recv().ok(), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_discards_pending() {
        let (mut debouncer, mut rx) = Debouncer::new(QUIET);

        debouncer.update(7u32);
        debouncer.cancel();
        advance(QUIET * 2).await;
        settle().await;

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_discards_pending() {
        let (mut debouncer, mut rx) = Debouncer::new(QUIET);

        debouncer.update(7u32);
        drop(debouncer);
        advance(QUIET * 2).await;
        settle().await;

        // sender dropped with the debouncer, nothing was sent
        assert!(rx.recv().await.is_none());
    }
}
