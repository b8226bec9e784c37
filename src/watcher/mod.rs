pub mod event;

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

use event::{RawChange, classify};
pub use event::WatchEvent;

/// Default quiet period after the last raw notification before a file is examined.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// A path whose watch could not be established. The path is left unwatched.
#[derive(Debug)]
pub struct WatchFailure {
    pub path: PathBuf,
    pub error: anyhow::Error,
}

/// A raw notification arrived and the debounce window has not elapsed yet.
#[derive(Debug, Clone, Copy)]
struct Pending {
    deadline: Instant,
    /// Sticky for the rest of the window: a remove followed by a recreate is a removal.
    removed: bool,
}

/// State for one watched file. The OS registration lives in the shared notify watcher
/// and is released together with the entry.
#[derive(Debug)]
struct WatchEntry {
    snapshot: Vec<u8>,
    pending: Option<Pending>,
}

/// Outcome of examining a file once its debounce window elapsed.
enum Settled {
    Unchanged,
    Changed(Vec<u8>),
    Removed,
    Unreadable(io::Error),
}

type Listener = Box<dyn FnMut(&WatchEvent) + Send>;

/// Debounced watcher over an explicit set of files.
///
/// Raw notify events are forwarded from notify's thread into a tokio channel. Debounce
/// deadlines are tracked per file and evaluated inside [`FileWatcher::next_event`], so the
/// watch set and the snapshots are only ever touched from the task that polls it.
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    raw_rx: mpsc::UnboundedReceiver<notify::Result<notify::Event>>,
    initial: Vec<PathBuf>,
    entries: HashMap<PathBuf, WatchEntry>,
    debounce: Duration,
    ready: VecDeque<WatchEvent>,
    listeners: Vec<Listener>,
    closed: bool,
}

impl FileWatcher {
    /// Create a watcher for `paths`. Nothing is watched until [`FileWatcher::start`].
    ///
    /// # Errors
    /// Fails when the platform watcher cannot be created (e.g. inotify instance limit).
    pub fn new(
        paths: impl IntoIterator<Item = PathBuf>,
        debounce: Duration,
    ) -> anyhow::Result<Self> {
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            // Receiver dropped means the watcher is shutting down.
            let _ = raw_tx.send(res);
        })
        .context("failed to create file system watcher")?;

        Ok(Self {
            watcher,
            raw_rx,
            initial: paths.into_iter().collect(),
            entries: HashMap::new(),
            debounce,
            ready: VecDeque::new(),
            listeners: Vec::new(),
            closed: false,
        })
    }

    /// Begin watching every path given at construction.
    ///
    /// Returns the paths that could not be watched; each is logged and left unwatched.
    pub fn start(&mut self) -> Vec<WatchFailure> {
        let initial = std::mem::take(&mut self.initial);
        self.add(initial)
    }

    /// Begin watching any paths not already watched. Already-watched paths keep their
    /// snapshot and pending timer.
    pub fn add(&mut self, paths: impl IntoIterator<Item = PathBuf>) -> Vec<WatchFailure> {
        let mut failures = Vec::new();
        for path in paths {
            if self.is_watched(&path) {
                continue;
            }
            match self.watch_path(&path) {
                Ok(()) => debug!(path = %path.display(), "watching"),
                Err(error) => {
                    warn!(path = %path.display(), error = %format!("{error:#}"), "file left unwatched");
                    failures.push(WatchFailure { path, error });
                }
            }
        }
        failures
    }

    /// Stop watching every path not in `keep`. Returns the paths that were dropped.
    pub fn retain(&mut self, keep: &BTreeSet<PathBuf>) -> Vec<PathBuf> {
        let stale: Vec<PathBuf> = self
            .entries
            .keys()
            .filter(|p| !keep.contains(*p))
            .cloned()
            .collect();
        for path in &stale {
            self.release(path);
            debug!(path = %path.display(), "no longer a dependency, unwatched");
        }
        stale
    }

    /// Stop watching everything. [`FileWatcher::next_event`] returns `None` afterwards.
    pub fn close(&mut self) {
        let paths: Vec<PathBuf> = self.entries.keys().cloned().collect();
        for path in &paths {
            self.release(path);
        }
        self.ready.clear();
        self.closed = true;
    }

    /// Register a callback invoked with every event before it is returned from
    /// [`FileWatcher::next_event`].
    pub fn on_event(&mut self, listener: impl FnMut(&WatchEvent) + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn is_watched(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    pub fn watched_paths(&self) -> BTreeSet<PathBuf> {
        self.entries.keys().cloned().collect()
    }

    /// Wait for the next debounced event.
    ///
    /// Cancel safe: raw notifications and pending deadlines survive a dropped call, so
    /// this can sit in a `tokio::select!` loop.
    pub async fn next_event(&mut self) -> Option<WatchEvent> {
        loop {
            if let Some(event) = self.ready.pop_front() {
                for listener in &mut self.listeners {
                    listener(&event);
                }
                return Some(event);
            }
            if self.closed {
                return None;
            }

            let deadline = self.next_deadline();
            tokio::select! {
                raw = self.raw_rx.recv() => match raw {
                    Some(Ok(event)) => self.record(&event),
                    Some(Err(err)) => warn!(error = %err, "file watch error"),
                    None => return None,
                },
                () = sleep_until(deadline) => self.settle_due(Instant::now()),
            }
        }
    }

    fn watch_path(&mut self, path: &Path) -> anyhow::Result<()> {
        let snapshot =
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        self.watcher
            .watch(path, RecursiveMode::NonRecursive)
            .with_context(|| format!("failed to watch {}", path.display()))?;
        self.entries.insert(
            path.to_path_buf(),
            WatchEntry {
                snapshot,
                pending: None,
            },
        );
        Ok(())
    }

    fn release(&mut self, path: &Path) {
        if self.entries.remove(path).is_some()
            && let Err(err) = self.watcher.unwatch(path)
        {
            // inotify drops the registration by itself once the file is gone.
            debug!(path = %path.display(), error = %err, "unwatch failed");
        }
    }

    /// (Re)start the debounce window for every watched path named by a raw event.
    fn record(&mut self, event: &notify::Event) {
        let Some(change) = classify(&event.kind) else {
            return;
        };
        let deadline = Instant::now() + self.debounce;

        for raw_path in &event.paths {
            let Some(key) = self.entry_key(raw_path) else {
                continue;
            };
            if let Some(entry) = self.entries.get_mut(&key) {
                let removed = change == RawChange::Removed
                    || entry.pending.is_some_and(|p| p.removed);
                entry.pending = Some(Pending { deadline, removed });
            }
        }
    }

    /// Notify may report a path spelled differently from the one registered
    /// (e.g. through a symlinked temp dir), so fall back to the canonical form.
    fn entry_key(&self, raw_path: &Path) -> Option<PathBuf> {
        if self.entries.contains_key(raw_path) {
            return Some(raw_path.to_path_buf());
        }
        raw_path
            .canonicalize()
            .ok()
            .filter(|p| self.entries.contains_key(p))
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.entries
            .values()
            .filter_map(|e| e.pending.map(|p| p.deadline))
            .min()
    }

    /// Examine every file whose debounce window has elapsed at `now`, queueing the
    /// resulting events in deadline order.
    fn settle_due(&mut self, now: Instant) {
        let mut due: Vec<(Instant, PathBuf)> = self
            .entries
            .iter()
            .filter_map(|(path, e)| {
                e.pending
                    .filter(|p| p.deadline <= now)
                    .map(|p| (p.deadline, path.clone()))
            })
            .collect();
        due.sort();

        for (_, path) in due {
            if let Some(event) = self.settle(path) {
                self.ready.push_back(event);
            }
        }
    }

    fn settle(&mut self, path: PathBuf) -> Option<WatchEvent> {
        let entry = self.entries.get_mut(&path)?;
        let pending = entry.pending.take()?;

        let outcome = if pending.removed {
            Settled::Removed
        } else {
            match std::fs::read(&path) {
                Ok(content) if content == entry.snapshot => Settled::Unchanged,
                Ok(content) => Settled::Changed(content),
                Err(err) if err.kind() == io::ErrorKind::NotFound => Settled::Removed,
                Err(err) => Settled::Unreadable(err),
            }
        };

        match outcome {
            Settled::Unchanged => {
                debug!(path = %path.display(), "touched but content identical");
                None
            }
            Settled::Changed(content) => {
                entry.snapshot = content;
                Some(WatchEvent::Changed(path))
            }
            Settled::Removed => {
                self.release(&path);
                Some(WatchEvent::Removed(path))
            }
            Settled::Unreadable(err) => {
                warn!(path = %path.display(), error = %err, "failed to read changed file");
                None
            }
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
