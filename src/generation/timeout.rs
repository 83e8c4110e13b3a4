//! Single-shot countdown guarding a tracked job.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Default ceiling for a full course generation (15 minutes).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Longest countdown the guard will run; longer requests are clamped.
pub const MAX_COUNTDOWN: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// One countdown at a time. Arming replaces any previous countdown;
/// dropping the guard disarms it.
#[derive(Debug, Default)]
pub struct TimeoutGuard {
    handle: Option<JoinHandle<()>>,
    deadline: Option<Instant>,
}

impl TimeoutGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `on_fire` after `duration` unless disarmed first.
    ///
    /// `duration` is clamped to [`MAX_COUNTDOWN`]. Must be called from
    /// within a tokio runtime.
    pub fn arm<F>(&mut self, duration: Duration, on_fire: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.disarm();
        let deadline = Instant::now().checked_add(duration.min(MAX_COUNTDOWN));
        self.deadline = deadline;
        self.handle = Some(tokio::spawn(async move {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                // Unrepresentable deadline: never fires on its own.
                None => std::future::pending::<()>().await,
            }
            on_fire();
        }));
    }

    /// Cancel the countdown. Returns whether one was pending.
    pub fn disarm(&mut self) -> bool {
        self.deadline = None;
        match self.handle.take() {
            Some(handle) => {
                let pending = !handle.is_finished();
                handle.abort();
                pending
            }
            None => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .filter(|_| self.is_armed())
            .map(|d| d.saturating_duration_since(Instant::now()))
    }
}

impl Drop for TimeoutGuard {
    fn drop(&mut self) {
        self.disarm();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counter() -> (Arc<AtomicU32>, impl FnOnce() + Send + 'static) {
        let fired = Arc::new(AtomicU32::new(0));
        let f = fired.clone();
        (fired, move || {
            f.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_duration() {
        let (fired, on_fire) = counter();
        let mut guard = TimeoutGuard::new();
        guard.arm(Duration::from_secs(60), on_fire);
        assert!(guard.is_armed());

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!guard.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarm_prevents_fire() {
        let (fired, on_fire) = counter();
        let mut guard = TimeoutGuard::new();
        guard.arm(Duration::from_secs(60), on_fire);
        assert!(guard.disarm());
        assert!(!guard.disarm());

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_previous_countdown() {
        let (first, on_first) = counter();
        let (second, on_second) = counter();
        let mut guard = TimeoutGuard::new();
        guard.arm(Duration::from_secs(10), on_first);
        guard.arm(Duration::from_secs(30), on_second);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining_counts_down() {
        let (_fired, on_fire) = counter();
        let mut guard = TimeoutGuard::new();
        assert!(guard.remaining().is_none());
        guard.arm(Duration::from_secs(100), on_fire);
        tokio::time::sleep(Duration::from_secs(40)).await;
        assert_eq!(guard.remaining(), Some(Duration::from_secs(60)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_duration_is_clamped() {
        let (fired, on_fire) = counter();
        let mut guard = TimeoutGuard::new();
        guard.arm(Duration::from_secs(u64::MAX), on_fire);
        assert!(guard.is_armed());
        assert_eq!(guard.remaining(), Some(MAX_COUNTDOWN));

        tokio::time::sleep(Duration::from_secs(24 * 60 * 60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(guard.disarm());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_disarms() {
        let (fired, on_fire) = counter();
        {
            let mut guard = TimeoutGuard::new();
            guard.arm(Duration::from_secs(5), on_fire);
        }
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
