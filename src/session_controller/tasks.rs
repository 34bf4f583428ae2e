//! Supervised fire-and-forget tasks
//!
//! Captures and video assembly run detached from the command loop. A panic
//! inside one is caught and logged here so it never reaches the controller.

use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Spawner for detached controller work
#[derive(Clone, Default)]
pub struct BackgroundTasks {
    in_flight: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` in the background. Panics are logged, not propagated.
    pub fn spawn<F>(&self, kind: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let in_flight = self.in_flight.clone();
        let idle = self.idle.clone();

        tokio::spawn(async move {
            if let Err(panic) = AssertUnwindSafe(task).catch_unwind().await {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!(task = kind, reason = %reason, "Background task panicked");
            }

            if in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
                idle.notify_waiters();
            }
        });
    }

    /// Number of tasks not finished yet
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Wait until no task is running
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_wait_idle_with_nothing_spawned() {
        BackgroundTasks::new().wait_idle().await;
    }

    #[tokio::test]
    async fn test_wait_idle_waits_for_all() {
        let tasks = BackgroundTasks::new();
        let done = Arc::new(AtomicUsize::new(0));

        for ms in [30u64, 10, 20] {
            let done = done.clone();
            tasks.spawn("sleep", async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                done.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(tasks.in_flight(), 3);

        tasks.wait_idle().await;
        assert_eq!(done.load(Ordering::SeqCst), 3);
        assert_eq!(tasks.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let tasks = BackgroundTasks::new();
        let survived = Arc::new(AtomicUsize::new(0));

        tasks.spawn("boom", async { panic!("camera driver exploded") });
        let s = survived.clone();
        tasks.spawn("fine", async move {
            s.fetch_add(1, Ordering::SeqCst);
        });

        tasks.wait_idle().await;
        assert_eq!(survived.load(Ordering::SeqCst), 1);
        assert_eq!(tasks.in_flight(), 0);
    }
}
