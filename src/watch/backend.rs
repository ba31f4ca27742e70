// src/watch/backend.rs

//! Filesystem watch backend abstraction.
//!
//! The session talks to a [`WatchBackend`] instead of `notify` directly, so
//! tests can inject events through a fake backend. [`NotifyBackend`] is the
//! production implementation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::debug;

use crate::errors::Result;
use crate::types::FileEventKind;

/// Raw event produced by a backend, before any pattern filtering.
#[derive(Debug)]
pub enum BackendEvent {
    Change { kind: FileEventKind, path: PathBuf },
    Error(notify::Error),
}

/// Channel a backend pushes its events into. Unbounded because `notify`
/// delivers events from a synchronous callback.
pub type BackendEventSender = mpsc::UnboundedSender<BackendEvent>;

/// Builds a backend wired to the session's event channel.
pub type BackendFactory =
    Box<dyn FnOnce(BackendEventSender) -> Result<Box<dyn WatchBackend>> + Send>;

/// Trait abstracting the underlying filesystem watcher.
///
/// Every path is watched recursively. Dropping the backend releases the
/// underlying OS resources.
pub trait WatchBackend: Send {
    fn watch(&mut self, path: &Path) -> Result<()>;
    fn unwatch(&mut self, path: &Path) -> Result<()>;
}

/// Backend over `notify`'s recommended watcher, or its polling watcher when
/// a poll interval is configured.
pub struct NotifyBackend {
    inner: Box<dyn Watcher + Send>,
}

impl std::fmt::Debug for NotifyBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyBackend").finish_non_exhaustive()
    }
}

impl NotifyBackend {
    pub fn new(events: BackendEventSender, poll_interval: Option<Duration>) -> Result<Self> {
        // Called synchronously by notify whenever an event arrives.
        let handler = move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for (kind, path) in translate(event) {
                    if events.send(BackendEvent::Change { kind, path }).is_err() {
                        // Session is gone; nothing left to deliver to.
                        return;
                    }
                }
            }
            Err(err) => {
                let _ = events.send(BackendEvent::Error(err));
            }
        };

        let inner: Box<dyn Watcher + Send> = match poll_interval {
            Some(interval) => Box::new(PollWatcher::new(
                handler,
                Config::default().with_poll_interval(interval),
            )?),
            None => Box::new(RecommendedWatcher::new(handler, Config::default())?),
        };

        Ok(Self { inner })
    }

    /// Factory for [`WatchSession`](crate::engine::WatchSession) builders.
    pub fn factory(poll_interval: Option<Duration>) -> BackendFactory {
        Box::new(move |tx| {
            let backend = NotifyBackend::new(tx, poll_interval)?;
            Ok(Box::new(backend) as Box<dyn WatchBackend>)
        })
    }
}

impl WatchBackend for NotifyBackend {
    fn watch(&mut self, path: &Path) -> Result<()> {
        self.inner.watch(path, RecursiveMode::Recursive)?;
        Ok(())
    }

    fn unwatch(&mut self, path: &Path) -> Result<()> {
        self.inner.unwatch(path)?;
        Ok(())
    }
}

/// Map a notify event onto added/changed/removed per path.
///
/// Renames become a removal of the old path and an addition of the new one.
/// Access and unclassified events are dropped.
pub fn translate(event: Event) -> Vec<(FileEventKind, PathBuf)> {
    let kind = event.kind;
    let mut paths = event.paths;

    let single = |k: FileEventKind, paths: Vec<PathBuf>| -> Vec<(FileEventKind, PathBuf)> {
        paths.into_iter().map(|p| (k, p)).collect()
    };

    match kind {
        EventKind::Create(_) => single(FileEventKind::Added, paths),
        EventKind::Remove(_) => single(FileEventKind::Removed, paths),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            single(FileEventKind::Removed, paths)
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => single(FileEventKind::Added, paths),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if paths.len() == 2 => {
            let to = paths.pop();
            let from = paths.pop();
            from.map(|p| (FileEventKind::Removed, p))
                .into_iter()
                .chain(to.map(|p| (FileEventKind::Added, p)))
                .collect()
        }
        EventKind::Modify(ModifyKind::Name(_)) => paths
            .into_iter()
            .map(|p| {
                let k = if p.exists() {
                    FileEventKind::Added
                } else {
                    FileEventKind::Removed
                };
                (k, p)
            })
            .collect(),
        EventKind::Modify(_) | EventKind::Any => single(FileEventKind::Changed, paths),
        EventKind::Access(_) | EventKind::Other => {
            debug!(?kind, "ignoring notify event kind");
            Vec::new()
        }
    }
}
