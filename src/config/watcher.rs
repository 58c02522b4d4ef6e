//! Strategies file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::registry::StrategyRegistry;
use crate::strategy::StrategyFactory;

/// A watcher that monitors the strategies source for changes and reloads
/// through the factory. Only successful loads are forwarded; a failed
/// reload is logged and the live registry is left untouched.
pub struct StrategyWatcher {
    path: PathBuf,
    factory: Arc<StrategyFactory>,
    update_tx: mpsc::UnboundedSender<StrategyRegistry>,
}

impl StrategyWatcher {
    /// Create a new StrategyWatcher.
    ///
    /// Returns the watcher and a receiver for freshly loaded registries.
    pub fn new(
        path: &Path,
        factory: Arc<StrategyFactory>,
    ) -> (Self, mpsc::UnboundedReceiver<StrategyRegistry>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                factory,
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching the source in a background thread. Directory sources
    /// are watched non-recursively, matching the flat directory load.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx.clone();
        let path = self.path.clone();
        let factory = self.factory.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!("strategies change detected, reloading");
                        match factory.load(&path) {
                            Ok(registry) => {
                                let _ = tx.send(registry);
                            }
                            Err(e) => {
                                tracing::error!(
                                    error = %e,
                                    "failed to reload strategies, keeping current configuration"
                                );
                            }
                        }
                    }
                }
                Err(e) => tracing::error!(error = ?e, "watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = %self.path.display(), "strategies watcher started");
        Ok(watcher)
    }
}
