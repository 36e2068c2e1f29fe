use std::time::Duration;

use tokio::task::JoinHandle;

/// A cancellable one-shot scheduled action.
///
/// Arming spawns a task that sleeps for the delay and then runs the action.
/// `cancel` (and dropping the handle) aborts the task; cancelling after the
/// action already ran is a no-op, and whether a fired action does anything
/// is the action's own concern.
#[derive(Debug)]
pub(crate) struct ScheduledTimeout {
    handle: JoinHandle<()>,
}

impl ScheduledTimeout {
    pub(crate) fn arm<F>(delay: Duration, on_fire: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_fire();
        });
        Self { handle }
    }

    pub(crate) fn cancel(&self) {
        self.handle.abort();
    }
}

impl Drop for ScheduledTimeout {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn fires_after_the_delay() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        let _timeout = ScheduledTimeout::arm(Duration::from_secs(5), move || {
            flag.store(true, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(4_999)).await;
        assert!(!fired.load(Ordering::SeqCst));

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(fired.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_firing() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        let timeout = ScheduledTimeout::arm(Duration::from_secs(5), move || {
            flag.store(true, Ordering::SeqCst);
        });

        timeout.cancel();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn drop_prevents_firing() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        let timeout = ScheduledTimeout::arm(Duration::from_secs(5), move || {
            flag.store(true, Ordering::SeqCst);
        });

        drop(timeout);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }
}
