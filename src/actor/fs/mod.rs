//! FileSystem Actor
//!
//! Watches the project tree and turns bursts of raw notify events into a
//! single sync trigger.
//!
//! ```text
//! notify ─(std mpsc)─> bridge thread ─(tokio mpsc)─> Debouncer ─> ScanRules filter ─> SyncMsg::Trigger
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use super::messages::{SyncMsg, TriggerReason};
use crate::project::ScanRules;

mod debouncer;

use debouncer::Debouncer;

/// FileSystem Actor - watches for project file changes
pub struct FsActor {
    /// Channel to receive notify events (sync -> async bridge)
    notify_rx: std::sync::mpsc::Receiver<notify::Result<notify::Event>>,
    /// Watcher handle (must be kept alive)
    _watcher: RecommendedWatcher,
    sync_tx: mpsc::Sender<SyncMsg>,
    root: PathBuf,
    rules: ScanRules,
    debounce: Duration,
}

impl FsActor {
    /// Start watching `root` recursively.
    ///
    /// Events buffer in the channel until [`Self::run`] is called.
    pub fn new(
        root: PathBuf,
        rules: ScanRules,
        sync_tx: mpsc::Sender<SyncMsg>,
        debounce: Duration,
    ) -> notify::Result<Self> {
        let (notify_tx, notify_rx) = std::sync::mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = notify_tx.send(res);
        })?;
        watcher.watch(&root, RecursiveMode::Recursive)?;

        Ok(Self {
            notify_rx,
            _watcher: watcher,
            sync_tx,
            root,
            rules,
            debounce,
        })
    }

    /// Run the actor event loop
    pub async fn run(self) {
        let Self {
            notify_rx,
            _watcher,
            sync_tx,
            root,
            rules,
            debounce,
        } = self;
        let mut debouncer = Debouncer::new(debounce);

        let (async_tx, mut async_rx) = mpsc::channel::<notify::Event>(64);

        // notify delivers on its own thread; forward into the runtime
        std::thread::spawn(move || {
            while let Ok(result) = notify_rx.recv() {
                match result {
                    Ok(event) => {
                        if async_tx.blocking_send(event).is_err() {
                            break; // Receiver dropped
                        }
                    }
                    Err(e) => crate::log!("watch"; "notify error: {}", e),
                }
            }
        });

        loop {
            tokio::select! {
                biased;
                event = async_rx.recv() => match event {
                    Some(event) => debouncer.add_event(&event),
                    None => break,
                },
                _ = tokio::time::sleep(debouncer.sleep_duration()) => {
                    let Some(paths) = debouncer.take_if_ready() else { continue };
                    let Some(reason) = relevant_changes(&root, &rules, paths) else { continue };
                    if sync_tx.send(SyncMsg::Trigger(reason)).await.is_err() {
                        break; // SyncActor shut down
                    }
                }
            }
        }
        crate::debug!("watch"; "watcher stopped");
    }
}

/// Keep the project files among `paths`, relative to `root`.
fn relevant_changes(root: &Path, rules: &ScanRules, paths: Vec<PathBuf>) -> Option<TriggerReason> {
    let changed: Vec<PathBuf> = paths
        .into_iter()
        .filter(|p| rules.is_relevant(root, p))
        .filter_map(|p| p.strip_prefix(root).ok().map(Path::to_path_buf))
        .collect();

    for path in &changed {
        crate::debug!("watch"; "changed: {}", path.display());
    }
    (!changed.is_empty()).then_some(TriggerReason::FileChange(changed))
}
