//! Cancellable delayed callbacks for momentary button release.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};

/// Spawns one timer task per armed release on a runtime handle.
///
/// Every timer gets a unique id that is handed to its callback, so the
/// callback can tell whether it is still the armed timer once it holds
/// whatever lock protects the button.
pub struct ReleaseScheduler {
    handle: Handle,
    delay: Duration,
    next_id: AtomicU64,
}

impl ReleaseScheduler {
    pub fn new(handle: Handle, delay: Duration) -> Self {
        Self {
            handle,
            delay,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Arm a timer that calls `fire` with its id once the delay has elapsed.
    ///
    /// The deadline is fixed here, not when the task first runs.
    pub fn schedule<F>(&self, fire: F) -> ReleaseTimer
    where
        F: FnOnce(u64) + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let deadline = Instant::now() + self.delay;
        let task = self.handle.spawn(async move {
            sleep_until(deadline).await;
            fire(id);
        });
        ReleaseTimer { id, task }
    }
}

/// Handle to an armed release. Dropping it leaves the timer running.
#[derive(Debug)]
pub struct ReleaseTimer {
    id: u64,
    task: JoinHandle<()>,
}

impl ReleaseTimer {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Abort the timer task. A callback that already started is not interrupted.
    pub fn cancel(self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_delay_with_its_id() {
        let scheduler = ReleaseScheduler::new(Handle::current(), Duration::from_millis(100));
        let fired = Arc::new(Mutex::new(Vec::new()));

        let log = fired.clone();
        let timer = scheduler.schedule(move |id| log.lock().unwrap().push(id));
        let id = timer.id();

        tokio::time::sleep(Duration::from_millis(99)).await;
        assert!(fired.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(*fired.lock().unwrap(), vec![id]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_timer_never_fires() {
        let scheduler = ReleaseScheduler::new(Handle::current(), Duration::from_millis(100));
        let fired = Arc::new(Mutex::new(0u32));

        let count = fired.clone();
        let timer = scheduler.schedule(move |_| *count.lock().unwrap() += 1);
        timer.cancel();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(*fired.lock().unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ids_are_unique() {
        let scheduler = ReleaseScheduler::new(Handle::current(), Duration::from_millis(10));
        let a = scheduler.schedule(|_| {});
        let b = scheduler.schedule(|_| {});
        assert_ne!(a.id(), b.id());
        a.cancel();
        b.cancel();
    }
}
