//! Hot reload of the shield configuration.
//!
//! notify reports a single save as several modify/create events, and editors
//! often rewrite a file without changing it. A reload is published only when
//! the file parses, validates, and differs from the configuration last
//! published; everything else is logged and dropped.

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::ShieldConfig;

/// Tracks the configuration in force and decides whether a reload is news.
#[derive(Debug)]
pub struct ReloadState {
    path: PathBuf,
    current: ShieldConfig,
}

impl ReloadState {
    pub fn new(path: &Path, current: ShieldConfig) -> Self {
        Self {
            path: path.to_path_buf(),
            current,
        }
    }

    /// Re-read the file. Returns the new configuration only if it is valid
    /// and differs from the one in force.
    pub fn reload(&mut self) -> Option<ShieldConfig> {
        match load_config(&self.path) {
            Ok(config) if config == self.current => {
                tracing::debug!(path = ?self.path, "Config file touched but unchanged");
                None
            }
            Ok(config) => {
                self.current = config.clone();
                Some(config)
            }
            Err(e) => {
                tracing::error!(
                    path = ?self.path,
                    "Failed to reload config: {}. Keeping current configuration.",
                    e
                );
                None
            }
        }
    }

    pub fn current(&self) -> &ShieldConfig {
        &self.current
    }
}

/// Watches the configuration file and publishes changed configurations.
pub struct ConfigWatcher {
    state: ReloadState,
    update_tx: mpsc::UnboundedSender<ShieldConfig>,
}

impl ConfigWatcher {
    /// `current` is the configuration the shield started with.
    pub fn new(path: &Path, current: ShieldConfig) -> (Self, mpsc::UnboundedReceiver<ShieldConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let state = ReloadState::new(path, current);
        (Self { state, update_tx }, update_rx)
    }

    /// Start watching. The returned handle must be kept alive for as long as
    /// updates are wanted.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let Self { mut state, update_tx } = self;
        let path = state.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    if let Some(config) = state.reload() {
                        tracing::info!(path = ?state.path, "Config change detected, publishing");
                        let _ = update_tx.send(config);
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&path, RecursiveMode::NonRecursive)?;
        tracing::info!(path = ?path, "Config watcher started");
        Ok(watcher)
    }
}
