use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use globwatch::errors::Result;
use globwatch::types::FileEventKind;
use globwatch::watch::{BackendEvent, BackendEventSender, BackendFactory, WatchBackend};

#[derive(Debug, Default)]
struct FakeState {
    sender: Option<BackendEventSender>,
    watched: Vec<PathBuf>,
    history: Vec<String>,
    dropped: bool,
}

/// A fake watch backend that:
/// - records which roots are watched / unwatched
/// - lets the test inject filesystem events and backend errors.
///
/// Clones share state; hand [`FakeBackend::factory`] to the session builder
/// and keep the original to drive it.
#[derive(Debug, Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<FakeState>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn factory(&self) -> BackendFactory {
        let state = Arc::clone(&self.state);
        Box::new(move |tx| {
            state.lock().unwrap_or_else(|e| e.into_inner()).sender = Some(tx);
            Ok(Box::new(FakeInstance { state }) as Box<dyn WatchBackend>)
        })
    }

    /// Inject an event. Returns false once the session is gone.
    pub fn emit(&self, kind: FileEventKind, path: impl AsRef<Path>) -> bool {
        let event = BackendEvent::Change {
            kind,
            path: path.as_ref().to_path_buf(),
        };
        match &self.lock().sender {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    pub fn added(&self, path: impl AsRef<Path>) -> bool {
        self.emit(FileEventKind::Added, path)
    }

    pub fn changed(&self, path: impl AsRef<Path>) -> bool {
        self.emit(FileEventKind::Changed, path)
    }

    pub fn removed(&self, path: impl AsRef<Path>) -> bool {
        self.emit(FileEventKind::Removed, path)
    }

    /// Inject a backend failure.
    pub fn fail(&self, message: &str) -> bool {
        let event = BackendEvent::Error(notify::Error::generic(message));
        match &self.lock().sender {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Roots currently watched, sorted.
    pub fn watched(&self) -> Vec<PathBuf> {
        let mut watched = self.lock().watched.clone();
        watched.sort();
        watched
    }

    /// Every watch / unwatch call in order, as `"watch <path>"` or
    /// `"unwatch <path>"`.
    pub fn history(&self) -> Vec<String> {
        self.lock().history.clone()
    }

    /// Whether the session dropped its backend.
    pub fn is_dropped(&self) -> bool {
        self.lock().dropped
    }
}

struct FakeInstance {
    state: Arc<Mutex<FakeState>>,
}

impl FakeInstance {
    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl WatchBackend for FakeInstance {
    fn watch(&mut self, path: &Path) -> Result<()> {
        let mut state = self.lock();
        state.history.push(format!("watch {}", path.display()));
        state.watched.push(path.to_path_buf());
        Ok(())
    }

    fn unwatch(&mut self, path: &Path) -> Result<()> {
        let mut state = self.lock();
        state.history.push(format!("unwatch {}", path.display()));
        state.watched.retain(|p| p != path);
        Ok(())
    }
}

impl Drop for FakeInstance {
    fn drop(&mut self) {
        self.lock().dropped = true;
    }
}
