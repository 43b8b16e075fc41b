//! Inactivity timer that triggers status probes.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::PoisonError;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Calls a callback after `delay` without a [`Watchdog::reset`].
///
/// `reset` restarts the interval, so a firing never follows a reset by less
/// than `delay`. After firing the interval starts over. `cancel` is permanent.
/// A zero delay disables the watchdog.
#[derive(Debug)]
pub struct Watchdog {
    delay: Duration,
    restart: Arc<Notify>,
    cancel: CancellationToken,
    task: StdMutex<Option<JoinHandle<()>>>,
}

impl Watchdog {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            restart: Arc::new(Notify::new()),
            cancel: CancellationToken::new(),
            task: StdMutex::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn is_enabled(&self) -> bool {
        !self.delay.is_zero()
    }

    /// Spawns the timer task. Later calls, and calls after `cancel`, do
    /// nothing. Must be called from within a tokio runtime.
    pub fn start(&self, on_fire: impl Fn() + Send + 'static) {
        if !self.is_enabled() || self.cancel.is_cancelled() {
            return;
        }
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if task.is_some() {
            return;
        }
        let delay = self.delay;
        let restart = Arc::clone(&self.restart);
        let cancel = self.cancel.clone();
        *task = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = restart.notified() => {
                        trace!("watchdog reset");
                    }
                    _ = tokio::time::sleep(delay) => {
                        trace!(?delay, "watchdog fired");
                        on_fire();
                    }
                }
            }
        }));
    }

    pub fn reset(&self) {
        if !self.cancel.is_cancelled() {
            self.restart.notify_one();
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
        if let Some(task) = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;
    use tokio::time::sleep;

    const DELAY: Duration = Duration::from_secs(10);

    fn counting(watchdog: &Watchdog) -> Arc<AtomicUsize> {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        watchdog.start(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        fired
    }

    #[tokio::test(start_paused = true)]
    async fn fires_after_each_quiet_interval() {
        let watchdog = Watchdog::new(DELAY);
        let fired = counting(&watchdog);

        sleep(DELAY - Duration::from_millis(1)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        sleep(Duration::from_millis(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        sleep(DELAY).await;
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_postpones_firing() {
        let watchdog = Watchdog::new(DELAY);
        let fired = counting(&watchdog);

        for _ in 0..3 {
            sleep(Duration::from_secs(6)).await;
            watchdog.reset();
        }
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        sleep(DELAY + Duration::from_millis(1)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_is_permanent_and_idempotent() {
        let watchdog = Watchdog::new(DELAY);
        let fired = counting(&watchdog);
        watchdog.cancel();
        watchdog.cancel();
        watchdog.reset();

        sleep(DELAY * 3).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(watchdog.is_cancelled());

        // Starting again after cancel does nothing.
        let restarted = counting(&watchdog);
        sleep(DELAY * 2).await;
        assert_eq!(restarted.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_delay_disables_the_timer() {
        let watchdog = Watchdog::new(Duration::ZERO);
        assert!(!watchdog.is_enabled());
        let fired = counting(&watchdog);
        sleep(DELAY).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
