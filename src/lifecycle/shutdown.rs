//! Gateway shutdown trigger.
//!
//! One `Shutdown` is created at startup and handed to whatever may end the
//! process (the signal task, tests). The server holds a [`ShutdownListener`]
//! and stops accepting connections once it fires. The trigger is sticky: a
//! listener created after `trigger` still sees it, so a signal that arrives
//! while the gateway is still starting is not lost.

use tokio::sync::watch;

/// Sticky shutdown trigger shared by the signal task and the server.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    pub fn subscribe(&self) -> ShutdownListener {
        ShutdownListener { rx: self.tx.subscribe() }
    }

    /// Start shutting down. Later calls are no-ops.
    pub fn trigger(&self) {
        let first = self.tx.send_if_modified(|triggered| !std::mem::replace(triggered, true));
        if first {
            tracing::info!(listeners = self.tx.receiver_count(), "Gateway shutdown triggered");
        }
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Waits for a [`Shutdown`] to be triggered.
#[derive(Debug, Clone)]
pub struct ShutdownListener {
    rx: watch::Receiver<bool>,
}

impl ShutdownListener {
    /// Resolve once shutdown was triggered.
    ///
    /// Dropping every `Shutdown` handle also counts; nothing could trigger it
    /// afterwards.
    pub async fn triggered(mut self) {
        let _ = self.rx.wait_for(|triggered| *triggered).await;
    }
}
