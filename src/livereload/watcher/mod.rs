//! Filesystem watcher
//!
//! Every directory under the watch roots gets its own non-recursive watch, so
//! directories created later must be added by hand. The event loop runs on its
//! own thread:
//!
//! ```text
//! notify events ─→ ignore rules ─→ new dir? watch it ─→ Debouncer ─→ handler + Reload
//! notify errors ─→ handler + Error frame
//! shutdown      ─→ exit
//! ```

use std::error::Error;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{Receiver, after, select};
use jwalk::WalkDir;
use notify::event::{EventKind, ModifyKind};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use rustc_hash::FxHashSet;

use super::ReloadHandler;
use super::broadcast::Broadcaster;
use super::message::ReloadMessage;
use super::shutdown::ShutdownSignal;
use crate::error::WatchError;

mod debouncer;


pub(crate) use debouncer::{DEBOUNCE_MS, Debouncer};

// ============================================================================
// Change events
// ============================================================================

/// What happened to the changed paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
    Other,
}

impl ChangeKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Removed => "removed",
            Self::Other => "changed",
        }
    }

    /// `None` for events that never warrant a reload.
    fn from_notify(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Create(_) => Some(Self::Created),
            // chmod / mtime noise
            EventKind::Modify(ModifyKind::Metadata(_)) => None,
            EventKind::Modify(_) => Some(Self::Modified),
            EventKind::Remove(_) => Some(Self::Removed),
            EventKind::Any | EventKind::Other => Some(Self::Other),
            EventKind::Access(_) => None,
        }
    }
}

/// A filesystem change that survived the ignore rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub paths: Vec<PathBuf>,
}

impl ChangeEvent {
    pub(crate) fn describe(&self) -> String {
        self.paths
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind.label(), self.describe())
    }
}

// ============================================================================
// Ignore rules
// ============================================================================

/// Paths that never trigger a reload.
#[derive(Debug, Clone)]
pub(crate) struct IgnoreRules {
    extensions: Vec<String>,
}

impl IgnoreRules {
    pub(crate) fn new(extensions: &[String]) -> Self {
        Self {
            extensions: extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    pub(crate) fn is_ignored(&self, path: &Path) -> bool {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        self.extensions.contains(&ext) || is_temp_file(path)
    }
}

/// Check if path is a temp/backup file (editor artifacts).
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

// ============================================================================
// Watched directories
// ============================================================================

/// Set of directories holding a non-recursive watch.
#[derive(Debug, Default)]
pub(crate) struct WatchedDirs {
    dirs: Mutex<FxHashSet<PathBuf>>,
}

impl WatchedDirs {
    /// Watch `root` and every directory below it. Hidden directories are skipped.
    ///
    /// Returns the number of newly watched directories.
    pub(crate) fn add_tree<W: Watcher>(&self, watcher: &mut W, root: &Path) -> Result<usize, WatchError> {
        std::fs::metadata(root).map_err(|e| WatchError::Io(root.to_path_buf(), e))?;

        let mut dirs = Vec::new();
        for entry in WalkDir::new(root).sort(true) {
            let entry = entry.map_err(|e| WatchError::Walk(root.to_path_buf(), e.to_string()))?;
            if entry.file_type().is_dir() {
                dirs.push(entry.path());
            }
        }

        let mut added = 0;
        for dir in dirs {
            // The lock is only held for the membership check
            if !self.dirs.lock().insert(dir.clone()) {
                continue;
            }
            if let Err(e) = watcher.watch(&dir, RecursiveMode::NonRecursive) {
                self.dirs.lock().remove(&dir);
                return Err(e.into());
            }
            crate::debug!("watch"; "watching {}", dir.display());
            added += 1;
        }
        Ok(added)
    }

    /// Drop `root` and every directory below it from the set.
    ///
    /// The OS drops the watch of a deleted directory on its own, so unwatch
    /// errors are expected and ignored. Returns the number of forgotten entries.
    pub(crate) fn forget_tree<W: Watcher>(&self, watcher: &mut W, root: &Path) -> usize {
        let gone: Vec<_> = {
            let mut dirs = self.dirs.lock();
            let gone: Vec<_> = dirs.iter().filter(|d| d.starts_with(root)).cloned().collect();
            for dir in &gone {
                dirs.remove(dir);
            }
            gone
        };
        for dir in &gone {
            let _ = watcher.unwatch(dir);
        }
        gone.len()
    }

    pub(crate) fn contains(&self, dir: &Path) -> bool {
        self.dirs.lock().contains(dir)
    }

    pub(crate) fn len(&self) -> usize {
        self.dirs.lock().len()
    }
}

// ============================================================================
// Event loop
// ============================================================================

pub(crate) type EventRx = Receiver<notify::Result<notify::Event>>;

/// Create an OS watcher feeding a channel.
pub(crate) fn create_watcher() -> Result<(RecommendedWatcher, EventRx), WatchError> {
    let (tx, rx) = crossbeam::channel::unbounded();
    let watcher = notify::recommended_watcher(move |res| {
        let _ = tx.send(res);
    })?;
    Ok((watcher, rx))
}

pub(crate) struct EventLoop {
    watcher: RecommendedWatcher,
    events: EventRx,
    watched: Arc<WatchedDirs>,
    debouncer: Debouncer,
    ignore: IgnoreRules,
    handler: ReloadHandler,
    broadcaster: Arc<Broadcaster>,
    shutdown: ShutdownSignal,
}

impl EventLoop {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        watcher: RecommendedWatcher,
        events: EventRx,
        watched: Arc<WatchedDirs>,
        debounce: Duration,
        ignore: IgnoreRules,
        handler: ReloadHandler,
        broadcaster: Arc<Broadcaster>,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            watcher,
            events,
            watched,
            debouncer: Debouncer::new(debounce),
            ignore,
            handler,
            broadcaster,
            shutdown,
        }
    }

    /// Run until cancellation or until the event stream closes.
    pub(crate) fn run(mut self) {
        let events = self.events.clone();
        let shutdown = self.shutdown.receiver().clone();

        loop {
            select! {
                recv(events) -> res => match res {
                    Ok(Ok(event)) => self.on_event(event),
                    Ok(Err(err)) => self.on_error(&err),
                    Err(_) => break,
                },
                recv(shutdown) -> _ => break,
                recv(after(self.debouncer.sleep_duration())) -> _ => self.fire(),
            }
        }

        crate::debug!("watch"; "watcher stopped");
    }

    fn on_event(&mut self, event: notify::Event) {
        let Some(kind) = ChangeKind::from_notify(&event.kind) else {
            return;
        };
        let paths: Vec<_> = event
            .paths
            .into_iter()
            .filter(|p| !self.ignore.is_ignored(p))
            .collect();
        if paths.is_empty() {
            return;
        }

        match kind {
            ChangeKind::Created => {
                for path in &paths {
                    if let Err(err) = self.watch_if_dir(path) {
                        self.report(&err);
                        return;
                    }
                }
            }
            ChangeKind::Removed => {
                for path in &paths {
                    let forgotten = self.watched.forget_tree(&mut self.watcher, path);
                    if forgotten > 0 {
                        crate::debug!("watch"; "stopped watching {} (removed)", path.display());
                    }
                }
            }
            ChangeKind::Modified | ChangeKind::Other => {}
        }

        self.debouncer.add_event(ChangeEvent { kind, paths });
    }

    /// New directories are watched right away, without waiting for the debounce.
    fn watch_if_dir(&mut self, path: &Path) -> Result<(), WatchError> {
        let meta = std::fs::metadata(path).map_err(|e| WatchError::Io(path.to_path_buf(), e))?;
        if !meta.is_dir() || is_hidden(path) {
            return Ok(());
        }
        // A recreated directory may still be listed if its removal was missed
        self.watched.forget_tree(&mut self.watcher, path);
        let added = self.watched.add_tree(&mut self.watcher, path)?;
        crate::debug!("watch"; "added {} new director{} under {}", added, if added == 1 { "y" } else { "ies" }, path.display());
        Ok(())
    }

    fn fire(&mut self) {
        if let Some(event) = self.debouncer.take_if_ready() {
            (self.handler)(Ok(&event));
            self.broadcaster.broadcast(&ReloadMessage::Reload);
        }
    }

    fn on_error(&self, err: &notify::Error) {
        self.report(err);
        self.broadcaster
            .broadcast(&ReloadMessage::Error(err.to_string()));
    }

    fn report(&self, err: &(dyn Error + 'static)) {
        (self.handler)(Err(err));
    }
}
