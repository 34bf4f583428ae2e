//! PrinterStatusCache - Background-Refreshed Printer Status
//!
//! ## Responsibilities
//!
//! - Poll the printer on a fixed period from a single background loop
//! - Serve the last good [`PrinterStatusSnapshot`] to readers without blocking
//! - Keep the previous snapshot when a refresh fails
//!
//! The snapshot lives in a `watch` channel: the loop publishes whole values,
//! readers clone the latest one.

mod client;
mod types;

pub use client::PrusaLinkClient;
pub use types::*;

use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};

/// Where printer status comes from
#[async_trait]
pub trait PrinterStatusSource: Send + Sync {
    async fn fetch(&self) -> Result<PrinterStatusSnapshot>;
}

/// PrinterStatusCache instance
pub struct PrinterStatusCache {
    source: Arc<dyn PrinterStatusSource>,
    latest: Arc<watch::Sender<PrinterStatusSnapshot>>,
    running: Arc<RwLock<bool>>,
}

impl PrinterStatusCache {
    /// Create new PrinterStatusCache (not refreshing until [`start`](Self::start))
    pub fn new(source: Arc<dyn PrinterStatusSource>) -> Self {
        let (latest, _) = watch::channel(PrinterStatusSnapshot::default());
        Self {
            source,
            latest: Arc::new(latest),
            running: Arc::new(RwLock::new(false)),
        }
    }

    /// Start the refresh loop. A second call while running is ignored.
    pub async fn start(&self, poll_interval: Duration) {
        {
            let mut running = self.running.write().await;
            if *running {
                tracing::warn!("Printer status refresh already running");
                return;
            }
            *running = true;
        }

        tracing::info!(
            interval_ms = poll_interval.as_millis() as u64,
            "Starting printer status refresh"
        );

        let source = self.source.clone();
        let latest = self.latest.clone();
        let running = self.running.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                if !*running.read().await {
                    break;
                }

                match source.fetch().await {
                    Ok(snapshot) => {
                        tracing::debug!(
                            state = %snapshot.state_label,
                            progress = snapshot.progress_percent,
                            "Printer status refreshed"
                        );
                        latest.send_replace(snapshot);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Cannot refresh printer status");
                    }
                }
            }

            tracing::info!("Printer status refresh stopped");
        });
    }

    /// Stop the refresh loop after its current tick
    pub async fn stop(&self) {
        let mut running = self.running.write().await;
        *running = false;
        tracing::info!("Stopping printer status refresh");
    }

    /// Latest snapshot. Never touches the network.
    pub fn read(&self) -> PrinterStatusSnapshot {
        self.latest.borrow().clone()
    }

    /// Receiver that observes every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<PrinterStatusSnapshot> {
        self.latest.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays scripted results, then keeps failing
    struct ScriptedSource {
        script: Mutex<VecDeque<Result<PrinterStatusSnapshot>>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<PrinterStatusSnapshot>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PrinterStatusSource for ScriptedSource {
        async fn fetch(&self) -> Result<PrinterStatusSnapshot> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Error::Internal("printer offline".to_string())))
        }
    }

    fn printing(progress: f64) -> PrinterStatusSnapshot {
        PrinterStatusSnapshot {
            state_label: "PRINTING".to_string(),
            progress_percent: progress,
            time_remaining_seconds: 600,
        }
    }

    #[tokio::test]
    async fn test_read_before_refresh_is_default() {
        let cache = PrinterStatusCache::new(Arc::new(ScriptedSource::new(vec![])));
        assert_eq!(cache.read(), PrinterStatusSnapshot::default());
    }

    #[tokio::test]
    async fn test_refresh_publishes_snapshot() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(printing(12.0))]));
        let cache = PrinterStatusCache::new(source.clone());
        let mut rx = cache.subscribe();

        cache.start(Duration::from_millis(10)).await;
        rx.changed().await.unwrap();

        assert_eq!(cache.read(), printing(12.0));
        cache.stop().await;
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_snapshot() {
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(printing(50.0)),
            Err(Error::Internal("timeout".to_string())),
        ]));
        let cache = PrinterStatusCache::new(source.clone());

        cache.start(Duration::from_millis(10)).await;

        // Let several failing ticks go by
        while source.calls.load(Ordering::SeqCst) < 4 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert_eq!(cache.read(), printing(50.0));
        cache.stop().await;
    }

    #[tokio::test]
    async fn test_second_start_is_ignored() {
        let source = Arc::new(ScriptedSource::new(vec![]));
        let cache = PrinterStatusCache::new(source.clone());

        cache.start(Duration::from_millis(50)).await;
        cache.start(Duration::from_millis(50)).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Only one loop fired its immediate first tick
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        cache.stop().await;
    }
}
