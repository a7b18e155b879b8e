//! Rate file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::rates::service::RateService;

/// Reloads a [`RateService`] whenever its file changes.
pub struct RatesWatcher {
    path: PathBuf,
    service: Arc<RateService>,
}

impl RatesWatcher {
    pub fn new(path: &Path, service: Arc<RateService>) -> Self {
        Self {
            path: path.to_path_buf(),
            service,
        }
    }

    /// Start watching on notify's background thread.
    ///
    /// Watching stops when the returned watcher is dropped.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let service = self.service.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    tracing::info!("Rate file change detected, reloading");
                    // the service logs and keeps the current table on failure
                    let _ = service.reload();
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Rate file watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Rate file watcher started");
        Ok(watcher)
    }
}
