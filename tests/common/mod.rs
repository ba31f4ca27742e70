#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use globwatch::config::WatchOptions;
use globwatch::engine::{Subscription, WatchEvent, WatchHandle, WatchSession};
use globwatch::fs::mock::MockFileSystem;

pub use globwatch_test_utils::*;

/// Absolute path of a project file.
pub fn proj(rel: &str) -> PathBuf {
    PathBuf::from(format!("{PROJECT_ROOT}/{rel}"))
}

/// Emitter-mode session over a fake backend and an in-memory project.
pub fn emitter(
    patterns: &[&str],
    options: WatchOptions,
    fs: Arc<MockFileSystem>,
    backend: &FakeBackend,
) -> WatchHandle {
    WatchSession::builder(patterns)
        .options(options)
        .filesystem(fs)
        .backend(backend.factory())
        .spawn()
        .expect("session should start")
}

/// Next event on `sub`, failing the test after the usual timeout.
pub async fn next_event(sub: &mut Subscription) -> WatchEvent {
    with_timeout(sub.recv())
        .await
        .expect("subscription closed unexpectedly")
}

/// Path carried by the next file event on `sub`.
pub async fn next_path(sub: &mut Subscription) -> PathBuf {
    let event = next_event(sub).await;
    event
        .path()
        .map(PathBuf::from)
        .unwrap_or_else(|| panic!("expected a file event, got {event:?}"))
}

/// Drain everything currently buffered on `sub`.
pub fn drain(sub: &mut Subscription) -> Vec<WatchEvent> {
    std::iter::from_fn(|| sub.try_recv()).collect()
}
