use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use notify::EventKind;
use notify::event::ModifyKind;
use rustc_hash::FxHashSet;

/// Collects changed paths until the tree has been quiet for `window`.
///
/// Pure timing and deduplication; relevance is decided by the caller.
pub(super) struct Debouncer {
    pub(super) pending: FxHashSet<PathBuf>,
    pub(super) last_event: Option<Instant>,
    window: Duration,
}

impl Debouncer {
    pub(super) fn new(window: Duration) -> Self {
        Self {
            pending: FxHashSet::default(),
            last_event: None,
            window,
        }
    }

    pub(super) fn add_event(&mut self, event: &notify::Event) {
        match event.kind {
            EventKind::Create(_) | EventKind::Remove(_) => {}
            // mtime/chmod noise, including our own artifact writes
            EventKind::Modify(ModifyKind::Metadata(_)) => return,
            EventKind::Modify(_) => {}
            _ => return,
        }

        crate::debug!("watch"; "raw notify: {:?} {:?}", event.kind, event.paths);

        for path in &event.paths {
            if is_temp_file(path) {
                continue;
            }
            self.pending.insert(path.clone());
            self.last_event = Some(Instant::now());
        }
    }

    /// Drain the batch once the quiet window has passed.
    pub(super) fn take_if_ready(&mut self) -> Option<Vec<PathBuf>> {
        if !self.is_ready() {
            return None;
        }
        self.last_event = None;
        let mut paths: Vec<_> = self.pending.drain().collect();
        paths.sort_unstable();
        Some(paths)
    }

    pub(super) fn is_ready(&self) -> bool {
        match self.last_event {
            Some(last) => last.elapsed() >= self.window && !self.pending.is_empty(),
            None => false,
        }
    }

    /// Precise sleep duration until next possible ready time.
    pub(super) fn sleep_duration(&self) -> Duration {
        let Some(last_event) = self.last_event else {
            return Duration::from_secs(86400);
        };
        self.window
            .saturating_sub(last_event.elapsed())
            .max(Duration::from_millis(1))
    }
}

/// Editor swap/backup files and hidden files.
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}
