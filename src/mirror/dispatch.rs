//! Background execution of mirror deliveries.
//!
//! Every delivery runs on a task registered with a [`TaskTracker`], so the
//! server can wait for in-flight deliveries after it stops accepting traffic.
//! Nothing about a delivery, including a panic, reaches the request path.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures_util::FutureExt;
use tokio_util::task::TaskTracker;

use crate::mirror::binding::MirrorError;
use crate::observability::metrics;

/// Tracked set of deliveries that outlive the responses that produced them.
#[derive(Debug, Clone, Default)]
pub struct BackgroundTasks {
    tracker: TaskTracker,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `delivery` in the background, logging its outcome.
    pub fn wait_until<F>(&self, target: &'static str, delivery: F)
    where
        F: Future<Output = Result<(), MirrorError>> + Send + 'static,
    {
        self.spawn(deliver(target, delivery));
    }

    /// Run mirror work in the background. A panic is logged and contained.
    pub fn spawn<F>(&self, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tracker.spawn(async move {
            if AssertUnwindSafe(work).catch_unwind().await.is_err() {
                tracing::error!("Mirror task panicked");
            }
        });
    }

    /// Number of deliveries still running.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Wait for every delivery started so far, then keep accepting new ones.
    pub async fn settle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Stop tracking and wait up to `timeout` for in-flight deliveries.
    ///
    /// Returns false if deliveries were still running at the deadline; those
    /// are abandoned.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.tracker.close();
        let pending = self.tracker.len();
        if pending > 0 {
            tracing::info!(pending, "Waiting for in-flight mirror deliveries");
        }

        match tokio::time::timeout(timeout, self.tracker.wait()).await {
            Ok(()) => true,
            Err(_) => {
                tracing::warn!(
                    abandoned = self.tracker.len(),
                    "Mirror drain deadline reached, abandoning deliveries"
                );
                false
            }
        }
    }
}

/// Await one delivery and record how it ended.
pub async fn deliver<F>(target: &'static str, delivery: F)
where
    F: Future<Output = Result<(), MirrorError>>,
{
    match AssertUnwindSafe(delivery).catch_unwind().await {
        Ok(Ok(())) => {
            tracing::debug!(target_kind = target, "Mirror delivered");
            metrics::record_mirror_dispatch(target, "delivered");
        }
        Ok(Err(e)) => {
            tracing::error!(target_kind = target, error = %e, "Mirror service call failed");
            metrics::record_mirror_dispatch(target, "failed");
        }
        Err(_) => {
            tracing::error!(target_kind = target, "Mirror service call panicked");
            metrics::record_mirror_dispatch(target, "panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_failures_are_contained() {
        let tasks = BackgroundTasks::new();
        let completed = Arc::new(AtomicUsize::new(0));

        let c = completed.clone();
        tasks.wait_until("structured", async move {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        tasks.wait_until("fetch", async { Err(MirrorError::Transport("connection refused".into())) });
        let explode = true;
        tasks.wait_until("fetch", async move {
            if explode {
                panic!("binding blew up");
            }
            Ok(())
        });

        tasks.settle().await;
        assert_eq!(completed.load(Ordering::SeqCst), 1);
        assert_eq!(tasks.in_flight(), 0);

        // still usable after settling
        let c = completed.clone();
        tasks.wait_until("structured", async move {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        tasks.settle().await;
        assert_eq!(completed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_drain_deadline() {
        let tasks = BackgroundTasks::new();
        tasks.wait_until("fetch", async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        });

        assert!(!tasks.drain(Duration::from_millis(50)).await);

        let quick = BackgroundTasks::new();
        quick.wait_until("fetch", async { Ok(()) });
        assert!(quick.drain(Duration::from_secs(5)).await);
    }
}
