use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use globwatch::config::WatchOptions;
use globwatch::engine::{Completion, Done};
use globwatch::fs::mock::MockFileSystem;

/// Root of the in-memory project used by the session tests.
pub const PROJECT_ROOT: &str = "/proj";

/// Debounce delay used in tests: short, but long enough that several
/// injected events land inside one window.
pub const TEST_DELAY: Duration = Duration::from_millis(30);

/// Options rooted at [`PROJECT_ROOT`] with a short debounce.
pub fn fast_options() -> WatchOptions {
    WatchOptions::new().delay(TEST_DELAY).cwd(PROJECT_ROOT)
}

/// Mock filesystem with the given files (relative to [`PROJECT_ROOT`]).
pub fn mock_project(files: &[&str]) -> Arc<MockFileSystem> {
    let fs = MockFileSystem::new();
    fs.add_dir(PROJECT_ROOT);
    for file in files {
        fs.add_file(format!("{PROJECT_ROOT}/{file}"));
    }
    Arc::new(fs)
}

/// Records callback invocations and lets a test decide when runs finish.
#[derive(Debug, Clone, Default)]
pub struct RunRecorder {
    runs: Arc<AtomicUsize>,
    held: Arc<Mutex<Vec<Done>>>,
}

impl RunRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times a callback built from this recorder was invoked.
    pub fn count(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    /// Callback that completes immediately with success.
    pub fn immediate(&self) -> impl FnMut(Done) -> Completion + Send + 'static {
        let runs = Arc::clone(&self.runs);
        move |_done| {
            runs.fetch_add(1, Ordering::SeqCst);
            Completion::ok()
        }
    }

    /// Callback that fails immediately with `message`.
    pub fn failing(&self, message: &'static str) -> impl FnMut(Done) -> Completion + Send + 'static {
        let runs = Arc::clone(&self.runs);
        move |_done| {
            runs.fetch_add(1, Ordering::SeqCst);
            Completion::err(anyhow!(message))
        }
    }

    /// Callback whose runs stay in flight until [`RunRecorder::release`].
    pub fn holding(&self) -> impl FnMut(Done) -> Completion + Send + 'static {
        let runs = Arc::clone(&self.runs);
        let held = Arc::clone(&self.held);
        move |done| {
            held.lock().unwrap().push(done);
            runs.fetch_add(1, Ordering::SeqCst);
            Completion::Pending
        }
    }

    /// Finish the oldest held run successfully. Returns false if none is held.
    pub fn release(&self) -> bool {
        let done = {
            let mut held = self.held.lock().unwrap();
            if held.is_empty() {
                return false;
            }
            held.remove(0)
        };
        done.ok();
        true
    }

    /// Finish the oldest held run with an error. Returns false if none is held.
    pub fn fail(&self, message: &'static str) -> bool {
        let done = {
            let mut held = self.held.lock().unwrap();
            if held.is_empty() {
                return false;
            }
            held.remove(0)
        };
        done.fail(anyhow!(message));
        true
    }

    /// Callback whose runs finish through a future that fails with
    /// `message` after `delay`.
    pub fn deferred_failing(
        &self,
        delay: Duration,
        message: &'static str,
    ) -> impl FnMut(Done) -> Completion + Send + 'static {
        let runs = Arc::clone(&self.runs);
        move |_done| {
            runs.fetch_add(1, Ordering::SeqCst);
            Completion::deferred(async move {
                tokio::time::sleep(delay).await;
                Err(anyhow!(message))
            })
        }
    }

    /// Wait until at least `n` runs were started.
    pub async fn wait_for_runs(&self, n: usize) {
        while self.count() < n {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}
