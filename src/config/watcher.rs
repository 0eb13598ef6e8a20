//! App file watcher for `--watch` synthesis.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::synthesize_file;
use crate::synth::Template;

/// Monitors an app file and re-synthesizes it on every change.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<Template>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver for freshly synthesized templates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<Template>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching the file. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx;
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    tracing::info!(
                        path = %path.display(),
                        "App file change detected, resynthesizing"
                    );
                    match synthesize_file(&path) {
                        Ok(template) => {
                            let _ = tx.send(template);
                        }
                        Err(e) => {
                            tracing::error!(
                                error = %e,
                                "Synthesis failed. Keeping the last template."
                            );
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "App file watcher started");
        Ok(watcher)
    }
}
